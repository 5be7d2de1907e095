use crate::catalog::{DirectoryEntry, StorageMethod};
use crate::error::{Result, SeekError};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Parent of a normalised name; the root is `""`.
fn parent(name: &str) -> &str {
    name.rfind('/').map_or("", |i| &name[..i])
}

fn implied_dir(name: &str) -> DirectoryEntry {
    DirectoryEntry {
        name: name.to_string(),
        offset: 0,
        size: 0,
        method: StorageMethod::Stored,
        crc32: 0,
        is_dir: true,
        modified: None,
    }
}

/// Hierarchy over the flat catalog: explicit entries plus every directory
/// implied by a member's path.
#[derive(Debug, Default)]
pub(crate) struct Tree {
    nodes: HashMap<String, DirectoryEntry>,
    children: BTreeMap<String, BTreeSet<String>>,
    implied: HashSet<String>,
}

impl Tree {
    pub(crate) fn build(entries: &[DirectoryEntry]) -> Self {
        let mut t = Tree::default();
        t.nodes.insert(String::new(), implied_dir(""));
        t.children.insert(String::new(), BTreeSet::new());
        for e in entries {
            if e.name.is_empty() {
                continue;
            }
            t.ensure_dirs(parent(&e.name));
            // first record wins, and any record replaces an implied directory
            if t.nodes.contains_key(&e.name) && !t.implied.remove(&e.name) {
                continue;
            }
            t.nodes.insert(e.name.clone(), e.clone());
            if e.is_dir {
                t.children.entry(e.name.clone()).or_default();
            }
            t.link(&e.name);
        }
        t
    }

    fn link(&mut self, name: &str) {
        self.children
            .entry(parent(name).to_string())
            .or_default()
            .insert(name.to_string());
    }

    fn ensure_dirs(&mut self, dir: &str) {
        if dir.is_empty() || self.children.contains_key(dir) {
            return;
        }
        self.ensure_dirs(parent(dir));
        if !self.nodes.contains_key(dir) {
            self.nodes.insert(dir.to_string(), implied_dir(dir));
            self.implied.insert(dir.to_string());
        }
        self.children.entry(dir.to_string()).or_default();
        self.link(dir);
    }

    pub(crate) fn get(&self, name: &str) -> Option<&DirectoryEntry> {
        self.nodes.get(name)
    }

    /// Immediate children of `dir`, lexically ordered.
    pub(crate) fn list(&self, dir: &str) -> Result<Vec<DirectoryEntry>> {
        let kids = self
            .children
            .get(dir)
            .ok_or_else(|| SeekError::NotFound(format!("no such directory: {dir:?}")))?;
        Ok(kids.iter().filter_map(|k| self.nodes.get(k)).cloned().collect())
    }

    /// Depth-first, lexical, `root` first. Every node is visited once.
    pub(crate) fn walk<F>(&self, root: &str, visit: &mut F) -> Result<()>
    where
        F: FnMut(&DirectoryEntry) -> Result<()>,
    {
        let node = self
            .nodes
            .get(root)
            .ok_or_else(|| SeekError::NotFound(root.to_string()))?;
        visit(node)?;
        if let Some(kids) = self.children.get(root) {
            for k in kids {
                self.walk(k, visit)?;
            }
        }
        Ok(())
    }
}
