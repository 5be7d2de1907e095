use serde::{Deserialize, Serialize};

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    Store = 0,
    Zstd = 1,
}

impl CodecId {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CodecId::Store),
            1 => Some(CodecId::Zstd),
            _ => None,
        }
    }
}

/// Single-shot block codec used to turn one frame into one compressed unit.
///
/// Implementations must not carry state between calls: every output of
/// `compress` has to be decodable on its own.
pub trait Compressor: Send + Sync {
    fn id(&self) -> CodecId;
    fn compress(&self, src: &[u8], level: i32) -> std::io::Result<Vec<u8>>;
    /// Decode `src`, refusing to produce more than `max_size` bytes.
    fn decompress(&self, src: &[u8], max_size: usize) -> std::io::Result<Vec<u8>>;
}

pub fn codec_for(id: CodecId) -> Box<dyn Compressor> {
    match id {
        CodecId::Store => Box::new(store::Store),
        CodecId::Zstd => Box::new(zstdc::ZstdCompressor),
    }
}

pub mod store;
pub mod zstdc;
