use crate::catalog::builder::ZipBuilder;
use crate::codec::codec_for;
use crate::error::{Result, SeekError};
use crate::options::CreateOptions;
use crate::pack::writer::SeekableWriter;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateSummary {
    pub files: usize,
    pub dirs: usize,
    /// Bytes of member data copied in.
    pub member_bytes: u64,
    /// Length of the zip stream, i.e. the archive's logical size.
    pub logical_bytes: u64,
    pub frames: usize,
    pub archive_bytes: u64,
}

/// Member name for a host path: `/`-separated, without leading `./` or `/`.
/// `..` components are refused. An empty result means the path names the root.
pub fn member_name(path: &Path) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();
    for c in path.components() {
        match c {
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(SeekError::Config(format!(
                    "refusing path with '..': {}",
                    path.display()
                )));
            }
        }
    }
    Ok(parts.join("/"))
}

/// Canonical paths of the temp file and the target. Either may sit inside an
/// input tree and must not be read back into the archive.
fn own_outputs(parent: &Path, tmp: &Path, out: &Path) -> Result<Vec<PathBuf>> {
    let dir = std::fs::canonicalize(parent)?;
    Ok([tmp.file_name(), out.file_name()]
        .into_iter()
        .flatten()
        .map(|n| dir.join(n))
        .collect())
}

fn is_own_output(path: &Path, own: &[PathBuf]) -> bool {
    own.iter().any(|o| o.file_name() == path.file_name())
        && std::fs::canonicalize(path).is_ok_and(|c| own.contains(&c))
}

fn modified(md: &std::fs::Metadata) -> Option<OffsetDateTime> {
    md.modified().ok().map(OffsetDateTime::from)
}

/// Build a seekable archive at `out` from files and directory trees.
///
/// Members are named after the paths as given. Everything is written to a
/// temporary file next to `out`, which replaces `out` only on success.
pub fn create(inputs: &[&Path], out: &Path, opts: &CreateOptions) -> Result<CreateSummary> {
    opts.writer.validate()?;
    let parent = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    let own = own_outputs(parent, tmp.path(), out)?;
    let mut summary = CreateSummary::default();

    {
        let sink = BufWriter::new(tmp.as_file());
        let sw = SeekableWriter::new(sink, codec_for(opts.codec), opts.writer.clone())?;
        let mut zip = ZipBuilder::new(sw);

        for root in inputs {
            for e in WalkDir::new(root).follow_links(false).sort_by_file_name() {
                let e = e.map_err(std::io::Error::from)?;
                if e.file_type().is_file() && is_own_output(e.path(), &own) {
                    debug!(path = %e.path().display(), "skipping archive being written");
                    continue;
                }
                let name = member_name(e.path())?;
                if name.is_empty() {
                    continue;
                }
                let md = e.metadata().map_err(std::io::Error::from)?;
                if e.file_type().is_dir() {
                    zip.add_dir(&name, modified(&md))?;
                    summary.dirs += 1;
                } else if e.file_type().is_file() {
                    if opts.verbose {
                        info!(name = %name, size = md.len(), "adding");
                    }
                    let mut f = BufReader::new(File::open(e.path())?);
                    summary.member_bytes += zip.add_file(&name, &mut f, modified(&md))?;
                    summary.files += 1;
                } else {
                    debug!(path = %e.path().display(), "skipping non-regular file");
                }
            }
        }

        let sw = zip.finish()?;
        summary.logical_bytes = sw.logical_len();
        summary.frames = summary.logical_bytes.div_ceil(opts.writer.frame_size as u64) as usize;
        let mut sink = sw.finish()?;
        sink.flush()?;
    }

    tmp.as_file().sync_all()?;
    summary.archive_bytes = tmp.as_file().metadata()?.len();
    tmp.persist(out).map_err(|e| SeekError::Io(e.error))?;
    debug!(
        out = %out.display(),
        files = summary.files,
        dirs = summary.dirs,
        bytes = summary.archive_bytes,
        "archive created"
    );
    Ok(summary)
}
