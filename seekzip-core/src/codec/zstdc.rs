use super::{CodecId, Compressor};

pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn id(&self) -> CodecId {
        CodecId::Zstd
    }

    fn compress(&self, src: &[u8], level: i32) -> std::io::Result<Vec<u8>> {
        // One complete zstd frame per call, no dictionary shared across frames.
        zstd::bulk::compress(src, level.max(1))
    }

    fn decompress(&self, src: &[u8], max_size: usize) -> std::io::Result<Vec<u8>> {
        zstd::bulk::decompress(src, max_size)
    }
}
