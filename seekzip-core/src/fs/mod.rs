//! Read-only virtual filesystem over a seekable archive.

pub mod file;
mod walk;

use crate::catalog::{Catalog, DirectoryEntry};
use crate::codec::codec_for;
use crate::container::frametab::FrameEntry;
use crate::error::{Result, SeekError};
use crate::options::ArchiveOptions;
use crate::read::reader::SeekableReader;
use crate::source::{FileSource, MemSource, Source};
use crate::stats::Stats;
use file::{ArchiveFile, EntrySource};
use parking_lot::RwLock;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use walk::Tree;

/// Anything archives can be loaded from: a host directory, or another
/// archive for nested containers.
pub trait ReadOnlyFs {
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Random-access view of `path`. Defaults to reading it into memory.
    fn source(&self, path: &str) -> Result<Box<dyn Source>> {
        Ok(Box::new(MemSource::new(self.read_file(path)?)))
    }
}

/// Canonical lookup key: no leading `./` or `/`, no trailing `/`.
/// The root is the empty string.
pub fn normalize(name: &str) -> &str {
    let mut n = name;
    loop {
        if let Some(rest) = n.strip_prefix("./") {
            n = rest;
        } else if let Some(rest) = n.strip_prefix('/') {
            n = rest;
        } else {
            break;
        }
    }
    let n = n.trim_end_matches('/');
    if n == "." { "" } else { n }
}

pub(crate) struct Shared {
    reader: RwLock<Option<SeekableReader>>,
    catalog: Catalog,
    tree: Tree,
    open: AtomicBool,
}

impl Shared {
    /// Run `f` against the reader under the read lock, so `close` waits for
    /// in-flight reads instead of racing them.
    pub(crate) fn with_reader<T>(&self, f: impl FnOnce(&SeekableReader) -> Result<T>) -> Result<T> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SeekError::Closed);
        }
        let guard = self.reader.read();
        let reader = guard.as_ref().ok_or(SeekError::Closed)?;
        f(reader)
    }
}

/// An opened archive: seekable reader, catalog and directory tree.
///
/// Cheap to share by reference across threads; file handles keep only a
/// weak link to it.
pub struct ArchiveFs {
    shared: Arc<Shared>,
}

impl ArchiveFs {
    /// Acquire codec, reader and catalog over `source`, in that order.
    /// Whatever was acquired is released again if a later step fails.
    ///
    /// The codec is the one the archive's tail records; setting
    /// `opts.codec` makes any other codec an `InvalidFormat` error.
    pub fn open_archive(source: Box<dyn Source>, opts: &ArchiveOptions) -> Result<Self> {
        let codec = opts.codec.map(codec_for);
        let mut reader = SeekableReader::open_with(source, codec, &opts.reader)?;
        let catalog = match Catalog::parse(&reader) {
            Ok(c) => c,
            Err(e) => {
                if let Err(ce) = reader.close() {
                    warn!(error = %ce, "closing reader after failed catalog parse");
                }
                return Err(e);
            }
        };
        let tree = Tree::build(catalog.entries());
        debug!(
            entries = catalog.len(),
            logical = reader.size(),
            frames = reader.frames().len(),
            "opened archive"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                reader: RwLock::new(Some(reader)),
                catalog,
                tree,
                open: AtomicBool::new(true),
            }),
        })
    }

    pub fn open_path(path: &Path, opts: &ArchiveOptions) -> Result<Self> {
        let src = FileSource::open(path)?;
        Self::open_archive(Box::new(src), opts)
    }

    pub fn open_bytes(bytes: Vec<u8>, opts: &ArchiveOptions) -> Result<Self> {
        Self::open_archive(Box::new(MemSource::new(bytes)), opts)
    }

    /// Open an archive stored at `path` inside another filesystem.
    pub fn open_from_fs(fs: &dyn ReadOnlyFs, path: &str, opts: &ArchiveOptions) -> Result<Self> {
        Self::open_archive(fs.source(path)?, opts)
    }

    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<&Shared> {
        if !self.is_open() {
            return Err(SeekError::Closed);
        }
        Ok(&self.shared)
    }

    /// Recorded entries come from the catalog; the tree only adds directories
    /// implied by member paths.
    fn lookup(&self, name: &str) -> Result<&DirectoryEntry> {
        let shared = self.ensure_open()?;
        let key = normalize(name);
        shared
            .catalog
            .get(key)
            .or_else(|| shared.tree.get(key))
            .ok_or_else(|| SeekError::NotFound(name.to_string()))
    }

    fn lookup_file(&self, name: &str) -> Result<DirectoryEntry> {
        let entry = self.lookup(name)?;
        if entry.is_dir {
            return Err(SeekError::NotFound(format!("{name} is a directory")));
        }
        Ok(entry.clone())
    }

    pub fn open(&self, name: &str) -> Result<ArchiveFile> {
        let entry = self.lookup_file(name)?;
        Ok(ArchiveFile::new(Arc::downgrade(&self.shared), entry))
    }

    /// Whole member contents, checked against the recorded CRC-32.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.lookup_file(name)?;
        let data = self
            .shared
            .with_reader(|r| r.read_at(entry.offset, entry.size))?;
        let crc = crc32fast::hash(&data);
        if crc != entry.crc32 {
            return Err(SeekError::Integrity {
                frame: None,
                offset: entry.offset,
                reason: format!(
                    "member {:?}: crc32 {crc:08x}, expected {:08x}",
                    entry.name, entry.crc32
                ),
            });
        }
        Ok(data)
    }

    /// Entry for a file or directory; implied directories are reported too.
    pub fn stat(&self, name: &str) -> Result<DirectoryEntry> {
        self.lookup(name).cloned()
    }

    pub fn read_dir(&self, dir: &str) -> Result<Vec<DirectoryEntry>> {
        self.ensure_open()?.tree.list(normalize(dir))
    }

    /// Visit `root` and everything below it, depth-first in lexical order.
    /// An error from `visit` stops the walk and is returned.
    pub fn walk<F>(&self, root: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(&DirectoryEntry) -> Result<()>,
    {
        self.ensure_open()?.tree.walk(normalize(root), &mut visit)
    }

    /// Catalog entries in archive order.
    pub fn entries(&self) -> Result<&[DirectoryEntry]> {
        Ok(self.ensure_open()?.catalog.entries())
    }

    /// Member as a random-access source; see [`EntrySource`].
    pub fn entry_source(&self, name: &str) -> Result<EntrySource> {
        let entry = self.lookup_file(name)?;
        Ok(EntrySource::new(Arc::clone(&self.shared), entry))
    }

    /// Decompress every frame and check it against the frame index.
    pub fn verify(&self) -> Result<Stats> {
        self.shared.with_reader(|r| r.verify_all())
    }

    pub fn stats(&self) -> Result<Stats> {
        self.shared.with_reader(|r| Ok(r.stats()))
    }

    /// Frame table of the underlying stream.
    pub fn frames(&self) -> Result<Vec<FrameEntry>> {
        self.shared.with_reader(|r| Ok(r.frames().to_vec()))
    }

    /// Close the reader and its source. Waits for in-flight reads; open
    /// handles fail with `Closed` afterwards. Closing twice is `Ok`.
    pub fn close(&self) -> Result<()> {
        if !self.shared.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let reader = self.shared.reader.write().take();
        if let Some(mut r) = reader {
            r.close()?;
        }
        debug!("closed archive");
        Ok(())
    }
}

impl ReadOnlyFs for ArchiveFs {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        ArchiveFs::read_file(self, path)
    }

    fn source(&self, path: &str) -> Result<Box<dyn Source>> {
        Ok(Box::new(self.entry_source(path)?))
    }
}

/// Host directory as a [`ReadOnlyFs`]; paths may not escape the root.
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let p = Path::new(rel);
        if p.is_absolute() || p.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(SeekError::Config(format!("unsafe path: {rel}")));
        }
        Ok(self.root.join(p))
    }
}

fn host_error(path: &str, e: std::io::Error) -> SeekError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SeekError::NotFound(path.to_string())
    } else {
        SeekError::Io(e)
    }
}

impl ReadOnlyFs for DirFs {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?).map_err(|e| host_error(path, e))
    }

    fn source(&self, path: &str) -> Result<Box<dyn Source>> {
        let src = FileSource::open(&self.resolve(path)?).map_err(|e| host_error(path, e))?;
        Ok(Box::new(src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_prefixes() {
        assert_eq!(normalize("./a/b.txt"), "a/b.txt");
        assert_eq!(normalize("/a/"), "a");
        assert_eq!(normalize("././/x"), "x");
        assert_eq!(normalize("."), "");
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn dir_fs_refuses_escapes() {
        let d = DirFs::new("/tmp");
        assert!(matches!(d.read_file("../etc/passwd"), Err(SeekError::Config(_))));
        assert!(matches!(d.read_file("/etc/passwd"), Err(SeekError::Config(_))));
    }
}
