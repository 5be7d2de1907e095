use crate::container::frametab::FrameEntry;
use crate::domain::{FileRow, FrameRow};
use crate::error::Result;
use crate::fs::ArchiveFs;
use crate::options::ArchiveOptions;
use crate::stats::Stats;
use std::path::Path;

/// Number of frames overlapping `[off, off + len)`.
fn frames_spanned(frames: &[FrameEntry], off: u64, len: u64) -> usize {
    if len == 0 {
        return 0;
    }
    let first = frames.partition_point(|f| f.u_end() <= off);
    let last = frames.partition_point(|f| f.u_off < off + len);
    last.saturating_sub(first)
}

pub fn file_rows(fs: &ArchiveFs) -> Result<Vec<FileRow>> {
    let frames = fs.frames()?;
    Ok(fs
        .entries()?
        .iter()
        .map(|e| FileRow {
            path: e.name.clone(),
            size: e.size,
            is_dir: e.is_dir,
            offset: e.offset,
            crc32: e.crc32,
            frames: frames_spanned(&frames, e.offset, e.size),
        })
        .collect())
}

pub fn frame_rows(frames: &[FrameEntry]) -> Vec<FrameRow> {
    let total = frames.last().map_or(0, |f| f.u_end());
    frames
        .iter()
        .enumerate()
        .map(|(ordinal, f)| FrameRow {
            ordinal,
            c_off: f.c_off,
            c_size: f.c_size,
            u_off: f.u_off,
            u_size: f.u_size,
            checksum: f.checksum,
            pct_end: if total == 0 {
                100.0
            } else {
                (f.u_end() as f64 * 100.0 / total as f64) as f32
            },
        })
        .collect()
}

/// Members of the archive at `archive`, in catalog order.
pub fn list(archive: &Path, opts: &ArchiveOptions) -> Result<Vec<FileRow>> {
    let fs = ArchiveFs::open_path(archive, opts)?;
    let rows = file_rows(&fs)?;
    fs.close()?;
    Ok(rows)
}

/// Decompress and check every frame of the archive at `archive`.
pub fn verify(archive: &Path, opts: &ArchiveOptions) -> Result<Stats> {
    let fs = ArchiveFs::open_path(archive, opts)?;
    let stats = fs.verify()?;
    fs.close()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(u_off: u64, u_size: u64) -> FrameEntry {
        FrameEntry {
            c_off: u_off,
            c_size: u_size,
            u_off,
            u_size,
            checksum: 0,
        }
    }

    #[test]
    fn spans_and_percentages() {
        let frames = [frame(0, 10), frame(10, 10), frame(20, 10)];
        assert_eq!(frames_spanned(&frames, 0, 10), 1);
        assert_eq!(frames_spanned(&frames, 5, 10), 2);
        assert_eq!(frames_spanned(&frames, 9, 12), 3);
        assert_eq!(frames_spanned(&frames, 15, 0), 0);

        let rows = frame_rows(&frames);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].pct_end, 100.0);
        assert!(rows[0].pct_end > 33.0 && rows[0].pct_end < 34.0);
    }
}
