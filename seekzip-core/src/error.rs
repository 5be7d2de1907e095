use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeekError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("corrupt frame index: {0}")]
    CorruptIndex(String),

    /// A frame (or a catalog member) decoded to something other than what
    /// was recorded at write time. `frame` is `None` for member CRC failures.
    #[error("integrity error at logical offset {offset}: {reason}")]
    Integrity {
        frame: Option<usize>,
        offset: u64,
        reason: String,
    },

    #[error("range {offset}+{len} out of bounds (size {size})")]
    OutOfRange { offset: u64, len: u64, size: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported entry {name:?}: storage method {method} (only stored entries are allowed)")]
    UnsupportedEntry { name: String, method: u16 },

    #[error("resource is closed")]
    Closed,

    #[error("codec failure on frame {frame}: {source}")]
    Codec {
        frame: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, SeekError>;

impl From<SeekError> for std::io::Error {
    fn from(e: SeekError) -> Self {
        use std::io::ErrorKind;
        let kind = match &e {
            SeekError::Io(inner) => inner.kind(),
            SeekError::NotFound(_) => ErrorKind::NotFound,
            SeekError::OutOfRange { .. } | SeekError::Config(_) => ErrorKind::InvalidInput,
            SeekError::InvalidFormat(_)
            | SeekError::CorruptIndex(_)
            | SeekError::Integrity { .. } => ErrorKind::InvalidData,
            SeekError::UnsupportedEntry { .. } => ErrorKind::Unsupported,
            SeekError::Closed | SeekError::Codec { .. } => ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}

/// Recover a `SeekError` that travelled through an `std::io::Error`
/// (e.g. out of a `Read` impl). Plain I/O errors come back as `Io`.
pub fn from_io(e: std::io::Error) -> SeekError {
    if e.get_ref().is_some_and(|inner| inner.is::<SeekError>()) {
        if let Some(inner) = e.into_inner() {
            if let Ok(seek) = inner.downcast::<SeekError>() {
                return *seek;
            }
        }
        return SeekError::InvalidFormat("unrecoverable wrapped error".into());
    }
    SeekError::Io(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_conversion_keeps_kind_and_roundtrips() {
        let io: std::io::Error = SeekError::NotFound("a.txt".into()).into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
        assert!(matches!(from_io(io), SeekError::NotFound(n) if n == "a.txt"));

        let io: std::io::Error = SeekError::Closed.into();
        assert!(matches!(from_io(io), SeekError::Closed));

        let plain = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(from_io(plain), SeekError::Io(_)));
    }
}
