use crate::codec::CodecId;
use crate::error::{Result, SeekError, from_io};
use crate::source::Source;

pub const TAIL_MAGIC: [u8; 8] = *b"SZFTAIL\0";
pub const TAIL_LEN: u64 = 48;
pub const TAIL_VERSION: u16 = 1;

/// Frame entries carry an XXH64 of their decompressed payload.
pub const FLAG_CHECKSUMS: u8 = 0b0000_0001;

/// Fixed-size trailer, always the last `TAIL_LEN` bytes of an archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tail {
    pub index_off: u64,
    pub index_len: u64,
    /// Logical (decompressed) size of the whole stream.
    pub total_u: u64,
    pub index_xxh64: u64,
    pub frame_count: u32,
    pub version: u16,
    pub codec: CodecId,
    pub flags: u8,
}

impl Tail {
    pub fn has_checksums(&self) -> bool {
        self.flags & FLAG_CHECKSUMS != 0
    }

    pub fn encode(&self) -> [u8; TAIL_LEN as usize] {
        let mut buf = [0u8; TAIL_LEN as usize];
        buf[0..8].copy_from_slice(&self.index_off.to_le_bytes());
        buf[8..16].copy_from_slice(&self.index_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.total_u.to_le_bytes());
        buf[24..32].copy_from_slice(&self.index_xxh64.to_le_bytes());
        buf[32..36].copy_from_slice(&self.frame_count.to_le_bytes());
        buf[36..38].copy_from_slice(&self.version.to_le_bytes());
        buf[38] = self.codec as u8;
        buf[39] = self.flags;
        buf[40..48].copy_from_slice(&TAIL_MAGIC);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != TAIL_LEN as usize {
            return Err(SeekError::InvalidFormat(format!(
                "tail must be {} bytes, got {}",
                TAIL_LEN,
                buf.len()
            )));
        }
        if buf[40..48] != TAIL_MAGIC {
            return Err(SeekError::InvalidFormat("bad tail magic".into()));
        }
        let version = u16::from_le_bytes([buf[36], buf[37]]);
        if version != TAIL_VERSION {
            return Err(SeekError::InvalidFormat(format!(
                "unsupported tail version {version}"
            )));
        }
        let codec = CodecId::from_u8(buf[38])
            .ok_or_else(|| SeekError::InvalidFormat(format!("unknown codec id {}", buf[38])))?;
        Ok(Self {
            index_off: le64(&buf[0..8]),
            index_len: le64(&buf[8..16]),
            total_u: le64(&buf[16..24]),
            index_xxh64: le64(&buf[24..32]),
            frame_count: u32::from_le_bytes([buf[32], buf[33], buf[34], buf[35]]),
            version,
            codec,
            flags: buf[39],
        })
    }
}

#[inline]
fn le64(x: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(x);
    u64::from_le_bytes(b)
}

/// Locate the Tail by reading the last `TAIL_LEN` bytes of the source, and
/// check that the index it points at ends exactly where the tail begins.
pub fn read_tail(src: &dyn Source) -> Result<Tail> {
    let len = src.size()?;
    if len < TAIL_LEN {
        return Err(SeekError::InvalidFormat(format!(
            "source is {len} bytes, too small for a tail"
        )));
    }
    let mut buf = [0u8; TAIL_LEN as usize];
    src.read_exact_at(len - TAIL_LEN, &mut buf).map_err(from_io)?;
    let tail = Tail::decode(&buf)?;

    let index_end = tail
        .index_off
        .checked_add(tail.index_len)
        .ok_or_else(|| SeekError::CorruptIndex("index range overflows".into()))?;
    if index_end != len - TAIL_LEN {
        return Err(SeekError::CorruptIndex(format!(
            "index declared at {}+{} but {} bytes precede the tail",
            tail.index_off,
            tail.index_len,
            len - TAIL_LEN
        )));
    }
    Ok(tail)
}
