use std::io::{Read, Seek, SeekFrom};

use crate::domain::{FileRow, FrameRow};
use crate::error::{Result, SeekError};
use crate::fs::ArchiveFs;
use crate::list::{file_rows, frame_rows};
use crate::repo::{ArchiveRepo, OpenParams};
use crate::stats::Stats;

pub struct FsArchiveRepo {
    fs: ArchiveFs,
}

impl FsArchiveRepo {
    pub fn new(params: OpenParams) -> Result<Self> {
        let fs = ArchiveFs::open_path(&params.archive_path, &params.options)?;
        Ok(Self { fs })
    }

    pub fn from_fs(fs: ArchiveFs) -> Self {
        Self { fs }
    }
}

impl ArchiveRepo for FsArchiveRepo {
    fn list_files(&self) -> Result<Vec<FileRow>> {
        file_rows(&self.fs)
    }

    fn frame_map(&self) -> Result<Vec<FrameRow>> {
        Ok(frame_rows(&self.fs.frames()?))
    }

    fn open_reader(&self, path: &str) -> Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(self.fs.open(path)?))
    }

    fn open_range(&self, path: &str, start: u64, len: u64) -> Result<Box<dyn Read + Send + '_>> {
        let mut f = self.fs.open(path)?;
        if start > f.size() {
            return Err(SeekError::OutOfRange {
                offset: start,
                len,
                size: f.size(),
            });
        }
        f.seek(SeekFrom::Start(start))?;
        Ok(Box::new(f.take(len)))
    }

    fn verify(&self) -> Result<Stats> {
        self.fs.verify()
    }

    fn close(&self) -> Result<()> {
        self.fs.close()
    }
}
