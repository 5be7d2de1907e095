//! Random-access byte sources the seekable reader pulls compressed frames from.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use parking_lot::Mutex;
use std::path::Path;

/// A read-only, random-access view of the compressed stream.
///
/// `read_exact_at` takes `&self` so one source can serve several readers'
/// requests; implementations serialise internally where the OS handle needs it.
pub trait Source: Send + Sync {
    fn size(&self) -> std::io::Result<u64>;

    fn read_exact_at(&self, off: u64, buf: &mut [u8]) -> std::io::Result<()>;

    /// Release the underlying handle. Must be safe to call more than once.
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub struct FileSource {
    f: Mutex<Option<File>>,
    len: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let f = File::open(path)?;
        Self::from_file(f)
    }

    pub fn from_file(f: File) -> std::io::Result<Self> {
        let len = f.metadata()?.len();
        Ok(Self {
            f: Mutex::new(Some(f)),
            len,
        })
    }
}

fn closed() -> std::io::Error {
    std::io::Error::other("source is closed")
}

impl Source for FileSource {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len)
    }

    fn read_exact_at(&self, off: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let mut guard = self.f.lock();
        let f = guard.as_mut().ok_or_else(closed)?;
        f.seek(SeekFrom::Start(off))?;
        f.read_exact(buf)
    }

    fn close(&mut self) -> std::io::Result<()> {
        // dropping the File closes the descriptor
        self.f.get_mut().take();
        Ok(())
    }
}

/// In-memory source, for archives already loaded into a buffer.
pub struct MemSource {
    data: Vec<u8>,
}

impl MemSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl Source for MemSource {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_exact_at(&self, off: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let start = usize::try_from(off).map_err(|_| eof())?;
        let end = start.checked_add(buf.len()).ok_or_else(eof)?;
        let src = self.data.get(start..end).ok_or_else(eof)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

fn eof() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "read past end of source",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn mem_source_bounds() {
        let s = MemSource::new(b"0123456789".to_vec());
        let mut buf = [0u8; 4];
        s.read_exact_at(3, &mut buf).unwrap();
        assert_eq!(&buf, b"3456");
        let err = s.read_exact_at(8, &mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn file_source_reads_and_closes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        let mut s = FileSource::open(tmp.path()).unwrap();
        assert_eq!(s.size().unwrap(), 11);
        let mut buf = [0u8; 5];
        s.read_exact_at(6, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
        s.close().unwrap();
        s.close().unwrap();
        assert!(s.read_exact_at(0, &mut buf).is_err());
    }

    #[test]
    fn file_source_serialises_concurrent_reads() {
        let data: Vec<u8> = (0..64 * 1024u32).map(|i| (i % 251) as u8).collect();
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();
        let s = FileSource::open(tmp.path()).unwrap();
        std::thread::scope(|scope| {
            for t in 0..4usize {
                let (s, data) = (&s, &data);
                scope.spawn(move || {
                    let mut buf = [0u8; 512];
                    for i in 0..50usize {
                        let off = (t * 4099 + i * 997) % (data.len() - buf.len());
                        s.read_exact_at(off as u64, &mut buf).unwrap();
                        assert_eq!(&buf[..], &data[off..off + buf.len()]);
                    }
                });
            }
        });
    }
}
