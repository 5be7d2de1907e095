use crate::codec::CodecId;
use crate::error::{Result, SeekError};
use serde::{Deserialize, Serialize};

/// 1 MiB of logical bytes per frame.
pub const DEFAULT_FRAME_SIZE: usize = 1 << 20;
pub const DEFAULT_CACHE_FRAMES: usize = 8;
/// Upper bound on logical bytes per frame, for writers and for indexes read
/// back. A reader allocates a whole frame before decoding it.
pub const MAX_FRAME_SIZE: usize = 256 << 20;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Logical bytes buffered before a frame is cut. Larger frames compress
    /// better; smaller frames make short random reads cheaper.
    pub frame_size: usize,
    pub level: i32,
    /// Record an XXH64 of every decompressed frame in the index.
    pub checksums: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            level: 3,
            checksums: true,
        }
    }
}

impl WriterOptions {
    pub fn validate(&self) -> Result<()> {
        if self.frame_size == 0 {
            return Err(SeekError::Config("frame_size must be > 0".into()));
        }
        if self.frame_size > MAX_FRAME_SIZE {
            return Err(SeekError::Config(format!(
                "frame_size {} exceeds the {MAX_FRAME_SIZE} byte limit",
                self.frame_size
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub verify_checksums: bool,
    /// Decompressed frames kept in the LRU cache; 0 disables caching.
    pub cache_frames: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            cache_frames: DEFAULT_CACHE_FRAMES,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Expected frame codec. `None` uses whatever the archive's tail records.
    pub codec: Option<CodecId>,
    pub reader: ReaderOptions,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            codec: None,
            reader: ReaderOptions::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateOptions {
    pub codec: CodecId,
    pub writer: WriterOptions,
    /// Log every member as it is added.
    pub verbose: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            codec: CodecId::Zstd,
            writer: WriterOptions::default(),
            verbose: false,
        }
    }
}
