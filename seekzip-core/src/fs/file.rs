use crate::catalog::DirectoryEntry;
use crate::error::{Result, SeekError};
use crate::fs::Shared;
use crate::read::cursor::resolve_seek;
use crate::source::Source;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Weak};

/// An open archive member.
///
/// Holds only a weak link to its archive: once the archive is closed or
/// dropped every operation fails with `Closed`. Reads starting at offset 0
/// and running sequentially to the end are checked against the member's
/// CRC-32.
pub struct ArchiveFile {
    shared: Weak<Shared>,
    entry: DirectoryEntry,
    pos: u64,
    crc: Option<crc32fast::Hasher>,
    closed: bool,
}

impl ArchiveFile {
    pub(crate) fn new(shared: Weak<Shared>, entry: DirectoryEntry) -> Self {
        Self {
            shared,
            entry,
            pos: 0,
            crc: Some(crc32fast::Hasher::new()),
            closed: false,
        }
    }

    fn live(&self) -> Result<Arc<Shared>> {
        if self.closed {
            return Err(SeekError::Closed);
        }
        self.shared.upgrade().ok_or(SeekError::Closed)
    }

    pub fn entry(&self) -> &DirectoryEntry {
        &self.entry
    }

    pub fn size(&self) -> u64 {
        self.entry.size
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Up to `len` bytes at member offset `off`, clamped to the member's end.
    /// Does not move the read position.
    pub fn read_at(&self, off: u64, len: u64) -> Result<Vec<u8>> {
        let shared = self.live()?;
        let size = self.entry.size;
        if off > size {
            return Err(SeekError::OutOfRange {
                offset: off,
                len,
                size,
            });
        }
        let n = len.min(size - off);
        shared.with_reader(|r| r.read_at(self.entry.offset + off, n))
    }

    /// Sequential read at the current position.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let shared = self.live()?;
        let remaining = self.entry.size - self.pos;
        let n = remaining.min(buf.len() as u64) as usize;
        if n > 0 {
            let at = self.entry.offset + self.pos;
            shared.with_reader(|r| r.read_exact_at(at, &mut buf[..n]))?;
            self.pos += n as u64;
            if let Some(h) = self.crc.as_mut() {
                h.update(&buf[..n]);
            }
        }
        if self.pos == self.entry.size {
            self.check_crc()?;
        }
        Ok(n)
    }

    fn check_crc(&mut self) -> Result<()> {
        let Some(h) = self.crc.take() else {
            return Ok(());
        };
        let got = h.finalize();
        if got != self.entry.crc32 {
            return Err(SeekError::Integrity {
                frame: None,
                offset: self.entry.offset,
                reason: format!(
                    "member {:?}: crc32 {got:08x}, expected {:08x}",
                    self.entry.name, self.entry.crc32
                ),
            });
        }
        Ok(())
    }

    /// Release the handle. Later operations fail with `Closed`; closing
    /// again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.crc = None;
        Ok(())
    }
}

impl Read for ArchiveFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl Seek for ArchiveFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.live()?;
        let next = resolve_seek(self.pos, self.entry.size, pos)?;
        if next == 0 {
            self.crc = Some(crc32fast::Hasher::new());
        } else if next != self.pos {
            // verification needs an unbroken pass from the start
            self.crc = None;
        }
        self.pos = next;
        Ok(next)
    }
}

/// A member exposed as a [`Source`], so an archive stored inside another
/// archive can be opened without copying it out.
pub struct EntrySource {
    shared: Option<Arc<Shared>>,
    entry: DirectoryEntry,
}

impl EntrySource {
    pub(crate) fn new(shared: Arc<Shared>, entry: DirectoryEntry) -> Self {
        Self {
            shared: Some(shared),
            entry,
        }
    }
}

impl Source for EntrySource {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.entry.size)
    }

    fn read_exact_at(&self, off: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let shared = self.shared.as_ref().ok_or(SeekError::Closed)?;
        let len = buf.len() as u64;
        if off.checked_add(len).is_none_or(|end| end > self.entry.size) {
            return Err(SeekError::OutOfRange {
                offset: off,
                len,
                size: self.entry.size,
            }
            .into());
        }
        Ok(shared.with_reader(|r| r.read_exact_at(self.entry.offset + off, buf))?)
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.shared = None;
        Ok(())
    }
}
