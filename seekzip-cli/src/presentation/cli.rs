use clap::{Args, Parser, Subcommand, ValueEnum};
use seekzip_core::CodecId;
use seekzip_core::options::{DEFAULT_CACHE_FRAMES, DEFAULT_FRAME_SIZE};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "seekzip: zip archives with random access through seekable frames", long_about = None)]
pub struct Cli {
    /// Verbose output (debug logging; RUST_LOG also works)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum CodecArg {
    #[default]
    Zstd,
    Store,
}

impl From<CodecArg> for CodecId {
    fn from(c: CodecArg) -> Self {
        match c {
            CodecArg::Zstd => CodecId::Zstd,
            CodecArg::Store => CodecId::Store,
        }
    }
}

/// How to open an existing archive.
#[derive(Args, Clone)]
pub struct ArchiveArgs {
    pub archive: PathBuf,

    /// Operate on an archive stored as this member of ARCHIVE
    #[arg(long)]
    pub inner: Option<String>,

    /// Fail unless the archive was written with this codec (read from the
    /// archive when omitted)
    #[arg(long, value_enum)]
    pub codec: Option<CodecArg>,

    /// Decompressed frames kept in memory (0 disables the cache)
    #[arg(long, default_value_t = DEFAULT_CACHE_FRAMES)]
    pub cache_frames: usize,

    /// Skip per-frame checksum verification
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an archive from files and directories
    Create {
        archive: PathBuf,

        #[arg(required_unless_present = "list")]
        inputs: Vec<PathBuf>,

        /// Compression level for the frame codec
        #[arg(short = 'l', long, default_value_t = 3)]
        level: i32,

        /// List an existing archive instead of creating one
        #[arg(short = 't', long = "list")]
        list: bool,

        /// Logical bytes per frame
        #[arg(long, default_value_t = DEFAULT_FRAME_SIZE)]
        frame_size: usize,

        #[arg(long, value_enum, default_value_t = CodecArg::Zstd)]
        codec: CodecArg,

        /// Do not record per-frame checksums
        #[arg(long)]
        no_checksums: bool,
    },

    /// List archive members
    List {
        #[command(flatten)]
        src: ArchiveArgs,
    },

    /// Stream a member (or range of it) to stdout
    Cat {
        #[command(flatten)]
        src: ArchiveArgs,
        path: String,
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long)]
        len: Option<u64>,
    },

    /// Write a member (or range of it) to an output path
    Get {
        #[command(flatten)]
        src: ArchiveArgs,
        path: String,
        out: PathBuf,
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long)]
        len: Option<u64>,
    },

    /// Print the frame table
    Frames {
        #[command(flatten)]
        src: ArchiveArgs,
    },

    /// Decompress every frame and check it against the index
    Verify {
        #[command(flatten)]
        src: ArchiveArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_create_flags() {
        let cli = Cli::try_parse_from([
            "seekzip", "create", "-v", "-l", "9", "--frame-size", "4096", "--codec", "store",
            "out.zip.szf", "a", "b",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Create {
                level,
                frame_size,
                codec,
                inputs,
                list,
                ..
            } => {
                assert_eq!(level, 9);
                assert_eq!(frame_size, 4096);
                assert!(matches!(codec, CodecArg::Store));
                assert_eq!(inputs.len(), 2);
                assert!(!list);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn create_list_mode_needs_no_inputs() {
        let cli = Cli::try_parse_from(["seekzip", "create", "-t", "out.zip.szf"]).unwrap();
        assert!(matches!(cli.command, Commands::Create { list: true, .. }));
        assert!(Cli::try_parse_from(["seekzip", "create", "out.zip.szf"]).is_err());
    }

    #[test]
    fn parses_ranged_cat() {
        let cli = Cli::try_parse_from([
            "seekzip", "cat", "a.szf", "dir/b.md", "--start", "2", "--len", "3", "--inner", "x",
        ])
        .unwrap();
        match cli.command {
            Commands::Cat {
                src, start, len, ..
            } => {
                assert_eq!(start, 2);
                assert_eq!(len, Some(3));
                assert_eq!(src.inner.as_deref(), Some("x"));
                assert_eq!(src.cache_frames, DEFAULT_CACHE_FRAMES);
                assert!(src.codec.is_none());
            }
            _ => panic!("expected cat"),
        }
    }
}
