use std::io::{Result, Write};

/// Owns a writer and counts the bytes that went through it, so record
/// offsets can be taken without seeking.
pub struct CountingWriter<W: Write> {
    inner: W,
    n: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, n: 0 }
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let k = self.inner.write(buf)?;
        self.n += k as u64;
        Ok(k)
    }
    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

/// Forwards writes while feeding a CRC-32 of everything that passes.
pub struct CrcForward<'a, W: Write> {
    inner: W,
    hasher: &'a mut crc32fast::Hasher,
    pub counted: u64,
}

impl<'a, W: Write> CrcForward<'a, W> {
    pub fn new(inner: W, hasher: &'a mut crc32fast::Hasher) -> Self {
        Self {
            inner,
            hasher,
            counted: 0,
        }
    }
}

impl<W: Write> Write for CrcForward<'_, W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let k = self.inner.write(buf)?;
        self.hasher.update(&buf[..k]);
        self.counted += k as u64;
        Ok(k)
    }
    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
