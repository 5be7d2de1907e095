#![forbid(unsafe_code)]

pub mod error;
pub mod options;
pub mod source;
pub mod stats;

pub mod util {
    pub mod forward;
}

pub mod codec;

pub mod container {
    pub mod frametab;
    pub mod tail;
}

pub mod pack {
    pub mod create;
    pub mod writer;
}

pub mod read {
    pub mod cache;
    pub mod cursor;
    pub mod reader;
}

pub mod catalog;
pub mod fs;

pub mod domain;
pub mod list;
pub mod repo;
pub mod repo_factory;
pub mod repo_fs;

// Re-exports: stable API surface
pub use catalog::{Catalog, DirectoryEntry, StorageMethod};
pub use codec::CodecId;
pub use error::{Result, SeekError};
pub use fs::file::ArchiveFile;
pub use fs::{ArchiveFs, DirFs, ReadOnlyFs};
pub use list::{list, verify};
pub use options::{ArchiveOptions, CreateOptions, ReaderOptions, WriterOptions};
pub use pack::create::create;
pub use pack::writer::SeekableWriter;
pub use read::reader::SeekableReader;
