use crate::container::tail::Tail;
use crate::error::{Result, SeekError};
use crate::options::MAX_FRAME_SIZE;
use xxhash_rust::xxh64::xxh64;

pub const ENTRY_SIZE: usize = 40;

/// One independently decodable frame: where its compressed bytes live and
/// which logical range they expand to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEntry {
    pub c_off: u64,
    pub c_size: u64,
    pub u_off: u64,
    pub u_size: u64,
    /// XXH64 of the decompressed payload; 0 when checksums are disabled.
    pub checksum: u64,
}

impl FrameEntry {
    #[inline]
    pub fn u_end(&self) -> u64 {
        self.u_off + self.u_size
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    pub frames: Vec<FrameEntry>,
    pub total_u: u64,
}

impl FrameIndex {
    /// Ordinal of the frame holding logical byte `offset`, if any.
    pub fn frame_for(&self, offset: u64) -> Option<usize> {
        let i = self.frames.partition_point(|f| f.u_end() <= offset);
        (i < self.frames.len()).then_some(i)
    }

    pub fn compressed_size(&self) -> u64 {
        self.frames.iter().map(|f| f.c_size).sum()
    }
}

pub fn encode(entries: &[FrameEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * ENTRY_SIZE);
    for e in entries {
        out.extend_from_slice(&e.c_off.to_le_bytes());
        out.extend_from_slice(&e.c_size.to_le_bytes());
        out.extend_from_slice(&e.u_off.to_le_bytes());
        out.extend_from_slice(&e.u_size.to_le_bytes());
        out.extend_from_slice(&e.checksum.to_le_bytes());
    }
    out
}

pub fn index_checksum(buf: &[u8]) -> u64 {
    xxh64(buf, 0)
}

#[inline]
fn le64(x: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(x);
    u64::from_le_bytes(b)
}

/// Decode and validate the serialized index described by `tail`.
pub fn decode(buf: &[u8], tail: &Tail) -> Result<FrameIndex> {
    let need = (tail.frame_count as u64)
        .checked_mul(ENTRY_SIZE as u64)
        .ok_or_else(|| SeekError::CorruptIndex("frame table size overflow".into()))?;
    if tail.index_len != need {
        return Err(SeekError::CorruptIndex(format!(
            "tail declares {} index bytes for {} frames, expected {}",
            tail.index_len, tail.frame_count, need
        )));
    }
    if buf.len() as u64 != tail.index_len {
        return Err(SeekError::CorruptIndex(format!(
            "frame table size mismatch: got {} bytes, expected {}",
            buf.len(),
            tail.index_len
        )));
    }
    if index_checksum(buf) != tail.index_xxh64 {
        return Err(SeekError::CorruptIndex("index checksum mismatch".into()));
    }

    let frames: Vec<FrameEntry> = buf
        .chunks_exact(ENTRY_SIZE)
        .map(|e| FrameEntry {
            c_off: le64(&e[0..8]),
            c_size: le64(&e[8..16]),
            u_off: le64(&e[16..24]),
            u_size: le64(&e[24..32]),
            checksum: le64(&e[32..40]),
        })
        .collect();

    validate(&frames, tail.total_u, tail.index_off)?;
    Ok(FrameIndex {
        frames,
        total_u: tail.total_u,
    })
}

/// Frames must tile `[0, total_u)` in order and keep their compressed bytes
/// in increasing, non-overlapping ranges below `data_end`. No frame may
/// expand to more than `MAX_FRAME_SIZE` bytes.
pub fn validate(frames: &[FrameEntry], total_u: u64, data_end: u64) -> Result<()> {
    let mut next_u = 0u64;
    let mut next_c = 0u64;
    for (i, f) in frames.iter().enumerate() {
        if f.u_off != next_u {
            return Err(SeekError::CorruptIndex(format!(
                "frame[{i}] starts at logical {} but previous frame ends at {}",
                f.u_off, next_u
            )));
        }
        if f.u_size > MAX_FRAME_SIZE as u64 {
            return Err(SeekError::CorruptIndex(format!(
                "frame[{i}] declares {} logical bytes, limit is {MAX_FRAME_SIZE}",
                f.u_size
            )));
        }
        if f.u_size > 0 && f.c_size == 0 {
            return Err(SeekError::CorruptIndex(format!(
                "frame[{i}] has {} logical bytes but no compressed bytes",
                f.u_size
            )));
        }
        if f.c_off < next_c {
            return Err(SeekError::CorruptIndex(format!(
                "frame[{i}] compressed range overlaps its predecessor"
            )));
        }
        let c_end = f
            .c_off
            .checked_add(f.c_size)
            .filter(|end| *end <= data_end)
            .ok_or_else(|| SeekError::CorruptIndex(format!("frame[{i}] out of bounds")))?;
        next_u = f
            .u_off
            .checked_add(f.u_size)
            .ok_or_else(|| SeekError::CorruptIndex(format!("frame[{i}] size overflow")))?;
        next_c = c_end;
    }
    if next_u != total_u {
        return Err(SeekError::CorruptIndex(format!(
            "frames cover {next_u} logical bytes, tail declares {total_u}"
        )));
    }
    Ok(())
}
