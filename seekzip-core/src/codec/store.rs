use super::{CodecId, Compressor};

pub struct Store;

impl Compressor for Store {
    fn id(&self) -> CodecId {
        CodecId::Store
    }

    fn compress(&self, src: &[u8], _level: i32) -> std::io::Result<Vec<u8>> {
        Ok(src.to_vec())
    }

    fn decompress(&self, src: &[u8], max_size: usize) -> std::io::Result<Vec<u8>> {
        if src.len() > max_size {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("stored frame is {} bytes, limit {}", src.len(), max_size),
            ));
        }
        Ok(src.to_vec())
    }
}
