use crate::read::reader::SeekableReader;
use std::io::{Read, Seek, SeekFrom};

/// File-like `Read + Seek` over a reader's logical address space.
///
/// Seeking to exactly `size()` is allowed and yields zero-length reads;
/// seeking past it or before 0 is an error.
pub struct LogicalCursor<'a> {
    reader: &'a SeekableReader,
    pos: u64,
}

impl<'a> LogicalCursor<'a> {
    pub fn new(reader: &'a SeekableReader) -> Self {
        Self { reader, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl Read for LogicalCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let size = self.reader.size();
        if self.pos >= size || buf.is_empty() {
            return Ok(0);
        }
        let n = (size - self.pos).min(buf.len() as u64) as usize;
        self.reader.read_exact_at(self.pos, &mut buf[..n])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for LogicalCursor<'_> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.pos = resolve_seek(self.pos, self.reader.size(), pos)?;
        Ok(self.pos)
    }
}

/// New position for `pos`, allowed anywhere in `0..=size`.
pub(crate) fn resolve_seek(cur: u64, size: u64, pos: SeekFrom) -> std::io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(n) => Some(n),
        SeekFrom::End(d) => size.checked_add_signed(d),
        SeekFrom::Current(d) => cur.checked_add_signed(d),
    };
    match target {
        Some(t) if t <= size => Ok(t),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("seek to {pos:?} outside 0..={size}"),
        )),
    }
}
