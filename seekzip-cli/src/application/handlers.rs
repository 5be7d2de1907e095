use std::io::{Read, Write};
use std::path::PathBuf;

use seekzip_core::domain::FileRow;
use seekzip_core::error::{Result, from_io};
use seekzip_core::repo::{ArchiveRepo, OpenParams};
use seekzip_core::repo_factory::{Backend, open_repo};
use seekzip_core::{ArchiveOptions, CreateOptions, ReaderOptions, WriterOptions, create};

use crate::presentation::cli::{ArchiveArgs, CodecArg};
use tracing::debug;

fn repo_from_args(args: &ArchiveArgs) -> Result<Box<dyn ArchiveRepo>> {
    let params = OpenParams {
        archive_path: args.archive.clone(),
        options: ArchiveOptions {
            codec: args.codec.map(Into::into),
            reader: ReaderOptions {
                verify_checksums: !args.no_verify,
                cache_frames: args.cache_frames,
            },
        },
    };
    debug!(archive = %args.archive.display(), inner = ?args.inner, "opening archive");
    let backend = match &args.inner {
        Some(inner) => Backend::Nested(inner.clone()),
        None => Backend::Fs,
    };
    open_repo(backend, params)
}

fn print_rows(rows: &[FileRow]) {
    for r in rows {
        if r.is_dir {
            println!("{:>12}  {}/", "-", r.path);
        } else {
            println!(
                "{:>12}  {}  (off={} frames={} crc={:08x})",
                r.size, r.path, r.offset, r.frames, r.crc32
            );
        }
    }
}

pub fn handle_create(
    archive: PathBuf,
    inputs: Vec<PathBuf>,
    level: i32,
    frame_size: usize,
    codec: CodecArg,
    no_checksums: bool,
    verbose: bool,
) -> Result<()> {
    let refs: Vec<_> = inputs.iter().map(|p| p.as_path()).collect();
    let opts = CreateOptions {
        codec: codec.into(),
        writer: WriterOptions {
            frame_size,
            level,
            checksums: !no_checksums,
        },
        verbose,
    };
    let s = create(&refs, &archive, &opts)?;
    if verbose {
        eprintln!(
            "created {}: {} files, {} dirs, {} -> {} bytes in {} frames",
            archive.display(),
            s.files,
            s.dirs,
            s.logical_bytes,
            s.archive_bytes,
            s.frames
        );
    }
    Ok(())
}

/// `create -t`: list with default reader settings.
pub fn handle_list_path(archive: PathBuf) -> Result<()> {
    let rows = seekzip_core::list(&archive, &ArchiveOptions::default())?;
    print_rows(&rows);
    Ok(())
}

pub fn handle_list(src: &ArchiveArgs) -> Result<()> {
    let repo = repo_from_args(src)?;
    print_rows(&repo.list_files()?);
    repo.close()
}

fn open_stream<'a>(
    repo: &'a dyn ArchiveRepo,
    path: &str,
    start: u64,
    len: Option<u64>,
) -> Result<Box<dyn Read + Send + 'a>> {
    match (start, len) {
        (0, None) => repo.open_reader(path),
        (s, l) => repo.open_range(path, s, l.unwrap_or(u64::MAX)),
    }
}

pub fn handle_cat(src: &ArchiveArgs, path: String, start: u64, len: Option<u64>) -> Result<()> {
    let repo = repo_from_args(src)?;
    {
        let mut reader = open_stream(repo.as_ref(), &path, start, len)?;
        let mut out = std::io::stdout().lock();
        std::io::copy(&mut reader, &mut out).map_err(from_io)?;
        out.flush()?;
    }
    repo.close()
}

pub fn handle_get(
    src: &ArchiveArgs,
    path: String,
    out: PathBuf,
    start: u64,
    len: Option<u64>,
) -> Result<()> {
    let repo = repo_from_args(src)?;
    {
        let mut reader = open_stream(repo.as_ref(), &path, start, len)?;
        let mut file = std::io::BufWriter::new(std::fs::File::create(&out)?);
        std::io::copy(&mut reader, &mut file).map_err(from_io)?;
        file.flush()?;
    }
    repo.close()
}

pub fn handle_frames(src: &ArchiveArgs) -> Result<()> {
    let repo = repo_from_args(src)?;
    for r in repo.frame_map()? {
        println!(
            "#{:<5} c_off={:<10} c={:<8} u_off={:<10} u={:<8} xxh64={:016x} {:>6.2}%",
            r.ordinal, r.c_off, r.c_size, r.u_off, r.u_size, r.checksum, r.pct_end
        );
    }
    repo.close()
}

pub fn handle_verify(src: &ArchiveArgs) -> Result<()> {
    let repo = repo_from_args(src)?;
    let stats = repo.verify()?;
    eprintln!(
        "verify: OK ({} frames, {} logical bytes, {} compressed, ratio {:.2})",
        stats.frames, stats.logical_bytes, stats.compressed_bytes, stats.compression_ratio
    );
    repo.close()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(archive: PathBuf) -> ArchiveArgs {
        ArchiveArgs {
            archive,
            inner: None,
            codec: None,
            cache_frames: 2,
            no_verify: false,
        }
    }

    #[test]
    fn create_then_get_range() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, b"0123456789abcdef").unwrap();
        let archive = dir.path().join("notes.zip.szf");

        handle_create(archive.clone(), vec![input.clone()], 1, 8, CodecArg::Store, false, false)
            .unwrap();
        let repo = repo_from_args(&args(archive.clone())).unwrap();
        let rows = repo.list_files().unwrap();
        repo.close().unwrap();
        let member = rows.iter().find(|r| !r.is_dir).unwrap().path.clone();
        assert!(member.ends_with("notes.txt"));

        let out = dir.path().join("slice");
        handle_get(&args(archive.clone()), member.clone(), out.clone(), 4, Some(6)).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"456789");

        handle_get(&args(archive.clone()), member, out.clone(), 0, None).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"0123456789abcdef");

        handle_verify(&args(archive)).unwrap();
    }

    #[test]
    fn codec_is_read_from_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("x");
        std::fs::write(&input, b"x").unwrap();
        let archive = dir.path().join("x.zip.szf");
        handle_create(archive.clone(), vec![input], 3, 64, CodecArg::Store, false, false).unwrap();

        handle_list(&args(archive.clone())).unwrap();
        handle_list_path(archive.clone()).unwrap();
        handle_verify(&args(archive.clone())).unwrap();

        let mut expect_zstd = args(archive);
        expect_zstd.codec = Some(CodecArg::Zstd);
        assert!(handle_list(&expect_zstd).is_err());
    }
}
