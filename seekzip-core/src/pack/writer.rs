use crate::codec::Compressor;
use crate::container::frametab::{self, FrameEntry};
use crate::container::tail::{FLAG_CHECKSUMS, TAIL_VERSION, Tail};
use crate::error::{Result, SeekError};
use crate::options::WriterOptions;
use std::io::Write;
use tracing::{debug, warn};
use xxhash_rust::xxh64::xxh64;

/// Sequential writer that cuts its input into independently compressed
/// frames and, on close, appends the frame index and the tail.
pub struct SeekableWriter<W: Write> {
    sink: Option<W>,
    codec: Option<Box<dyn Compressor>>,
    opts: WriterOptions,
    buf: Vec<u8>,
    frames: Vec<FrameEntry>,
    c_off: u64,
    u_off: u64,
}

impl<W: Write> SeekableWriter<W> {
    pub fn new(sink: W, codec: Box<dyn Compressor>, opts: WriterOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            sink: Some(sink),
            codec: Some(codec),
            buf: Vec::with_capacity(opts.frame_size),
            opts,
            frames: Vec::new(),
            c_off: 0,
            u_off: 0,
        })
    }

    pub fn frames(&self) -> &[FrameEntry] {
        &self.frames
    }

    /// Logical bytes accepted so far, including the unflushed buffer.
    pub fn logical_len(&self) -> u64 {
        self.u_off + self.buf.len() as u64
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    pub fn write_bytes(&mut self, mut data: &[u8]) -> Result<usize> {
        if self.sink.is_none() {
            return Err(SeekError::Closed);
        }
        let total = data.len();
        while !data.is_empty() {
            let room = self.opts.frame_size - self.buf.len();
            let take = room.min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buf.len() == self.opts.frame_size {
                if let Err(e) = self.flush_frame() {
                    // a half-written frame cannot be recovered; drop the sink
                    self.sink = None;
                    self.codec = None;
                    return Err(e);
                }
            }
        }
        Ok(total)
    }

    fn flush_frame(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let (Some(sink), Some(codec)) = (self.sink.as_mut(), self.codec.as_ref()) else {
            return Err(SeekError::Closed);
        };
        let frame = self.frames.len();
        let compressed = codec
            .compress(&self.buf, self.opts.level)
            .map_err(|source| SeekError::Codec { frame, source })?;
        sink.write_all(&compressed)?;

        let entry = FrameEntry {
            c_off: self.c_off,
            c_size: compressed.len() as u64,
            u_off: self.u_off,
            u_size: self.buf.len() as u64,
            checksum: if self.opts.checksums {
                xxh64(&self.buf, 0)
            } else {
                0
            },
        };
        debug!(
            frame,
            u_off = entry.u_off,
            u_size = entry.u_size,
            c_size = entry.c_size,
            "flushed frame"
        );
        self.c_off += entry.c_size;
        self.u_off += entry.u_size;
        self.frames.push(entry);
        self.buf.clear();
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        let (Some(sink), Some(codec)) = (self.sink.as_mut(), self.codec.as_ref()) else {
            return Err(SeekError::Closed);
        };
        let frame_count = u32::try_from(self.frames.len())
            .map_err(|_| SeekError::Config(format!("too many frames: {}", self.frames.len())))?;
        let index = frametab::encode(&self.frames);
        let tail = Tail {
            index_off: self.c_off,
            index_len: index.len() as u64,
            total_u: self.u_off,
            index_xxh64: frametab::index_checksum(&index),
            frame_count,
            version: TAIL_VERSION,
            codec: codec.id(),
            flags: if self.opts.checksums { FLAG_CHECKSUMS } else { 0 },
        };
        sink.write_all(&index)?;
        sink.write_all(&tail.encode())?;
        sink.flush()?;
        debug!(
            frames = frame_count,
            logical = tail.total_u,
            compressed = tail.index_off,
            "seekable stream finalized"
        );
        Ok(())
    }

    /// Flush the last frame, write index and tail, release codec and sink.
    /// Returns `None` when already closed.
    fn finalize(&mut self) -> Result<Option<W>> {
        if self.sink.is_none() {
            return Ok(None);
        }
        let res = self.flush_frame().and_then(|_| self.write_trailer());
        let sink = self.sink.take();
        self.codec = None;
        res.map(|_| sink)
    }

    pub fn close(&mut self) -> Result<()> {
        self.finalize().map(drop)
    }

    /// Close and hand the sink back (e.g. an in-memory buffer).
    pub fn finish(mut self) -> Result<W> {
        self.finalize()?.ok_or(SeekError::Closed)
    }
}

impl<W: Write> Write for SeekableWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    // Frames are only cut at the size threshold; flushing just reaches the sink.
    fn flush(&mut self) -> std::io::Result<()> {
        match self.sink.as_mut() {
            Some(s) => s.flush(),
            None => Err(SeekError::Closed.into()),
        }
    }
}

impl<W: Write> Drop for SeekableWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_some() {
            warn!("seekable writer dropped without close; finalizing");
            if let Err(e) = self.finalize() {
                warn!(error = %e, "finalizing dropped seekable writer failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::store::Store;
    use crate::codec::zstdc::ZstdCompressor;
    use crate::container::tail::TAIL_LEN;
    use crate::options::{MAX_FRAME_SIZE, ReaderOptions};
    use crate::read::reader::SeekableReader;
    use crate::source::MemSource;

    fn opts(frame_size: usize) -> WriterOptions {
        WriterOptions {
            frame_size,
            ..Default::default()
        }
    }

    #[test]
    fn cuts_frames_at_threshold() {
        let mut w = SeekableWriter::new(Vec::new(), Box::new(Store), opts(4)).unwrap();
        w.write_bytes(b"abcdefghij").unwrap();
        assert_eq!(w.frames().len(), 2);
        assert_eq!(w.logical_len(), 10);
        let out = w.finish().unwrap();
        // store codec: 10 payload bytes, 3 entries, tail
        assert_eq!(out.len() as u64, 10 + 3 * 40 + TAIL_LEN);
        assert_eq!(&out[..10], b"abcdefghij");
    }

    #[test]
    fn exact_multiple_leaves_no_empty_frame() {
        let mut w = SeekableWriter::new(Vec::new(), Box::new(Store), opts(5)).unwrap();
        w.write_bytes(b"0123456789").unwrap();
        w.close().unwrap();
        assert_eq!(w.frames().len(), 2);
        assert!(w.frames().iter().all(|f| f.u_size == 5));
    }

    #[test]
    fn empty_input_writes_only_index_and_tail() {
        let w = SeekableWriter::new(Vec::new(), Box::new(ZstdCompressor), opts(16)).unwrap();
        let out = w.finish().unwrap();
        assert_eq!(out.len() as u64, TAIL_LEN);
        let tail = Tail::decode(&out).unwrap();
        assert_eq!(tail.frame_count, 0);
        assert_eq!(tail.total_u, 0);
    }

    #[test]
    fn write_after_close_fails() {
        let mut w = SeekableWriter::new(Vec::new(), Box::new(Store), opts(8)).unwrap();
        w.write_bytes(b"data").unwrap();
        w.close().unwrap();
        w.close().unwrap();
        assert!(w.is_closed());
        assert!(matches!(w.write_bytes(b"more"), Err(SeekError::Closed)));
        assert!(w.write(b"more").is_err());
    }

    #[test]
    fn dropping_unclosed_writer_finalizes_it() {
        let data: Vec<u8> = (0..100u8).collect();
        let mut out = Vec::new();
        {
            let mut w = SeekableWriter::new(&mut out, Box::new(ZstdCompressor), opts(32)).unwrap();
            w.write_bytes(&data).unwrap();
            assert_eq!(w.frames().len(), 3);
        }
        let r = SeekableReader::open(
            Box::new(MemSource::new(out)),
            Box::new(ZstdCompressor),
            &ReaderOptions::default(),
        )
        .unwrap();
        assert_eq!(r.frames().len(), 4);
        assert_eq!(r.read_at(0, 100).unwrap(), data);
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        let err = SeekableWriter::new(Vec::new(), Box::new(Store), opts(0)).err();
        assert!(matches!(err, Some(SeekError::Config(_))));
    }

    #[test]
    fn oversized_frame_size_is_rejected() {
        let err = SeekableWriter::new(Vec::new(), Box::new(Store), opts(MAX_FRAME_SIZE + 1)).err();
        assert!(matches!(err, Some(SeekError::Config(_))));
    }

    #[test]
    fn checksums_can_be_disabled() {
        let o = WriterOptions {
            frame_size: 4,
            checksums: false,
            ..Default::default()
        };
        let mut w = SeekableWriter::new(Vec::new(), Box::new(Store), o).unwrap();
        w.write_bytes(b"abcdef").unwrap();
        let out = w.finish().unwrap();
        let tail = Tail::decode(&out[out.len() - TAIL_LEN as usize..]).unwrap();
        assert!(!tail.has_checksums());
    }
}
