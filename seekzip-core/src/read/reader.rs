use crate::codec::{Compressor, codec_for};
use crate::container::frametab::{self, FrameEntry, FrameIndex};
use crate::container::tail::{TAIL_LEN, Tail, read_tail};
use crate::error::{Result, SeekError, from_io};
use crate::options::ReaderOptions;
use crate::read::cache::FrameCache;
use crate::read::cursor::LogicalCursor;
use crate::source::Source;
use crate::stats::Stats;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use xxhash_rust::xxh64::xxh64;

/// Random access over the logical (decompressed) bytes of a seekable stream.
///
/// Only the frames overlapping a request are read and decompressed. `read_at`
/// takes `&self`; the source and the optional cache do their own locking, so
/// one reader can serve several handles at once.
pub struct SeekableReader {
    source: Box<dyn Source>,
    codec: Box<dyn Compressor>,
    tail: Tail,
    index: FrameIndex,
    cache: Option<Arc<FrameCache>>,
    verify: bool,
    closed: bool,
}

impl SeekableReader {
    /// Load tail and frame index from `source`, decoding frames with `codec`.
    /// The tail must record the same codec, otherwise the open fails with
    /// `InvalidFormat`. The source is closed before an error is returned, so
    /// a failed open leaks nothing.
    pub fn open(
        source: Box<dyn Source>,
        codec: Box<dyn Compressor>,
        opts: &ReaderOptions,
    ) -> Result<Self> {
        Self::open_with(source, Some(codec), opts)
    }

    /// Like [`open`](Self::open), but `None` takes the codec the tail records.
    pub fn open_with(
        mut source: Box<dyn Source>,
        codec: Option<Box<dyn Compressor>>,
        opts: &ReaderOptions,
    ) -> Result<Self> {
        let (tail, index, codec) = match Self::load(source.as_ref(), codec) {
            Ok(v) => v,
            Err(e) => {
                if let Err(ce) = source.close() {
                    warn!(error = %ce, "closing source after failed open");
                }
                return Err(e);
            }
        };
        debug!(
            frames = index.frames.len(),
            logical = index.total_u,
            codec = ?tail.codec,
            "opened seekable stream"
        );
        Ok(Self {
            source,
            codec,
            tail,
            index,
            cache: FrameCache::new(opts.cache_frames).map(Arc::new),
            verify: opts.verify_checksums,
            closed: false,
        })
    }

    fn load(
        src: &dyn Source,
        codec: Option<Box<dyn Compressor>>,
    ) -> Result<(Tail, FrameIndex, Box<dyn Compressor>)> {
        let tail = read_tail(src)?;
        let codec = match codec {
            Some(c) if c.id() != tail.codec => {
                return Err(SeekError::InvalidFormat(format!(
                    "archive frames use {:?}, reader was given {:?}",
                    tail.codec,
                    c.id()
                )));
            }
            Some(c) => c,
            None => codec_for(tail.codec),
        };
        let len = usize::try_from(tail.index_len)
            .map_err(|_| SeekError::CorruptIndex("index too large for memory".into()))?;
        let mut buf = vec![0u8; len];
        src.read_exact_at(tail.index_off, &mut buf).map_err(from_io)?;
        let index = frametab::decode(&buf, &tail)?;
        Ok((tail, index, codec))
    }

    /// Replace the reader's cache, e.g. to size it differently or to observe it.
    pub fn with_cache(mut self, cache: Option<Arc<FrameCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn size(&self) -> u64 {
        self.index.total_u
    }

    pub fn frames(&self) -> &[FrameEntry] {
        &self.index.frames
    }

    pub fn tail(&self) -> &Tail {
        &self.tail
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SeekError::Closed);
        }
        Ok(())
    }

    /// Read up to `len` bytes at `offset`; the length is clamped to the end
    /// of the logical space. `offset` past the end is `OutOfRange`.
    pub fn read_at(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let size = self.size();
        if offset > size {
            return Err(SeekError::OutOfRange { offset, len, size });
        }
        let n = len.min(size - offset);
        let n = usize::try_from(n).map_err(|_| SeekError::OutOfRange { offset, len, size })?;
        let mut out = vec![0u8; n];
        self.fill(offset, &mut out)?;
        Ok(out)
    }

    /// Fill `buf` from `offset`; the whole range must lie inside the logical space.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.ensure_open()?;
        let size = self.size();
        let len = buf.len() as u64;
        if offset.checked_add(len).is_none_or(|end| end > size) {
            return Err(SeekError::OutOfRange { offset, len, size });
        }
        self.fill(offset, buf)
    }

    fn fill(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        if out.is_empty() {
            return Ok(());
        }
        let mut ord = self.index.frame_for(offset).ok_or(SeekError::OutOfRange {
            offset,
            len: out.len() as u64,
            size: self.size(),
        })?;
        let mut pos = offset;
        let mut written = 0usize;
        while written < out.len() {
            let f = self.index.frames.get(ord).ok_or_else(|| {
                SeekError::CorruptIndex(format!("logical offset {pos} not covered by any frame"))
            })?;
            let plain = self.frame(ord)?;
            let start = (pos - f.u_off) as usize;
            let take = (plain.len() - start).min(out.len() - written);
            out[written..written + take].copy_from_slice(&plain[start..start + take]);
            written += take;
            pos += take as u64;
            ord += 1;
        }
        Ok(())
    }

    /// Decompressed payload of frame `ord`, served from the cache when present.
    pub fn frame(&self, ord: usize) -> Result<Arc<Vec<u8>>> {
        self.ensure_open()?;
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(ord) {
                trace!(frame = ord, "frame cache hit");
                return Ok(hit);
            }
            trace!(frame = ord, "frame cache miss");
        }
        let plain = Arc::new(self.decode_frame(ord)?);
        if let Some(cache) = &self.cache {
            cache.put(ord, Arc::clone(&plain));
        }
        Ok(plain)
    }

    fn decode_frame(&self, ord: usize) -> Result<Vec<u8>> {
        let f = self
            .index
            .frames
            .get(ord)
            .ok_or_else(|| SeekError::CorruptIndex(format!("no frame {ord}")))?;
        let integrity = |reason: String| SeekError::Integrity {
            frame: Some(ord),
            offset: f.u_off,
            reason: format!("frame {ord}: {reason}"),
        };
        let c_size = usize::try_from(f.c_size)
            .map_err(|_| SeekError::CorruptIndex(format!("frame[{ord}] too large")))?;
        let u_size = usize::try_from(f.u_size)
            .map_err(|_| SeekError::CorruptIndex(format!("frame[{ord}] too large")))?;

        let mut comp = vec![0u8; c_size];
        self.source.read_exact_at(f.c_off, &mut comp).map_err(from_io)?;
        trace!(frame = ord, c_off = f.c_off, c_size, "read frame");

        let plain = self
            .codec
            .decompress(&comp, u_size)
            .map_err(|e| integrity(format!("decode failed: {e}")))?;
        if plain.len() != u_size {
            return Err(integrity(format!(
                "decoded {} bytes, index records {}",
                plain.len(),
                u_size
            )));
        }
        if self.verify && self.tail.has_checksums() {
            let got = xxh64(&plain, 0);
            if got != f.checksum {
                return Err(integrity(format!(
                    "checksum {got:016x}, index records {:016x}",
                    f.checksum
                )));
            }
        }
        Ok(plain)
    }

    /// Decode every frame (bypassing the cache) and check it against the index.
    pub fn verify_all(&self) -> Result<Stats> {
        self.ensure_open()?;
        for ord in 0..self.index.frames.len() {
            self.decode_frame(ord)?;
        }
        Ok(self.stats())
    }

    pub fn stats(&self) -> Stats {
        let compressed = self.index.compressed_size();
        let logical = self.index.total_u;
        Stats {
            frames: self.index.frames.len() as u64,
            logical_bytes: logical,
            compressed_bytes: compressed,
            archive_bytes: self.tail.index_off + self.tail.index_len + TAIL_LEN,
            compression_ratio: if compressed == 0 {
                0.0
            } else {
                (logical as f64 / compressed as f64) as f32
            },
        }
    }

    /// `Read + Seek` view with its own position.
    pub fn cursor(&self) -> LogicalCursor<'_> {
        LogicalCursor::new(self)
    }

    /// Drop cached frames and close the source. Later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        self.source.close()?;
        debug!("closed seekable stream");
        Ok(())
    }
}

impl Drop for SeekableReader {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "closing seekable reader on drop");
        }
    }
}
