use crate::error::Result;
use crate::fs::ArchiveFs;
use crate::repo::{ArchiveRepo, OpenParams};
use crate::repo_fs::FsArchiveRepo;

pub enum Backend {
    /// The archive file itself.
    Fs,
    /// An archive stored as a member of the archive file.
    Nested(String),
}

pub fn open_repo(backend: Backend, p: OpenParams) -> Result<Box<dyn ArchiveRepo>> {
    match backend {
        Backend::Fs => Ok(Box::new(FsArchiveRepo::new(p)?)),
        Backend::Nested(inner) => {
            let outer = ArchiveFs::open_path(&p.archive_path, &p.options)?;
            // the inner source keeps the outer archive's reader alive
            let fs = ArchiveFs::open_from_fs(&outer, &inner, &p.options)?;
            Ok(Box::new(FsArchiveRepo::from_fs(fs)))
        }
    }
}
