use crate::domain::{FileRow, FrameRow};
use crate::error::Result;
use crate::options::ArchiveOptions;
use crate::stats::Stats;
use std::io::Read;

#[derive(Clone, Debug)]
pub struct OpenParams {
    pub archive_path: std::path::PathBuf,
    pub options: ArchiveOptions,
}

/// What the command line needs from an opened archive.
pub trait ArchiveRepo: Send + Sync {
    fn list_files(&self) -> Result<Vec<FileRow>>;

    fn frame_map(&self) -> Result<Vec<FrameRow>>;

    fn open_reader(&self, path: &str) -> Result<Box<dyn Read + Send + '_>>;

    fn open_range(&self, path: &str, start: u64, len: u64) -> Result<Box<dyn Read + Send + '_>>;

    fn verify(&self) -> Result<Stats>;

    fn close(&self) -> Result<()>;
}
