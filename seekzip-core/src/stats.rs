use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    pub frames: u64,
    pub logical_bytes: u64,
    /// Bytes of compressed frame payload (index and tail excluded).
    pub compressed_bytes: u64,
    pub archive_bytes: u64,
    pub compression_ratio: f32,
}
