use serde::Serialize;

/// One catalog member as shown by `list`.
#[derive(Clone, Debug, Serialize)]
pub struct FileRow {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
    /// Logical offset of the member's data.
    pub offset: u64,
    pub crc32: u32,
    /// Frames a full read of the member touches.
    pub frames: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct FrameRow {
    pub ordinal: usize,
    pub c_off: u64,
    pub c_size: u64,
    pub u_off: u64,
    pub u_size: u64,
    pub checksum: u64,
    /// Share of the logical stream covered up to the end of this frame.
    pub pct_end: f32,
}
