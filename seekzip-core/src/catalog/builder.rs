use crate::catalog::zipfmt::*;
use crate::error::{Result, SeekError, from_io};
use crate::util::forward::{CountingWriter, CrcForward};
use std::collections::HashSet;
use std::io::{Read, Write};
use time::OffsetDateTime;

// Unix mode bits in the high half of the external attributes.
const FILE_ATTRS: u32 = 0o100644 << 16;
const DIR_ATTRS: u32 = (0o040755 << 16) | 0x10;

struct Record {
    name: String,
    local_off: u64,
    crc32: u32,
    size: u64,
    dos_date: u16,
    dos_time: u16,
    is_dir: bool,
}

impl Record {
    fn needs_zip64(&self) -> bool {
        self.size >= SAT32 as u64 || self.local_off >= SAT32 as u64
    }

    fn encode_central(&self) -> Vec<u8> {
        let zip64 = self.needs_zip64();
        let mut extra = Vec::new();
        if zip64 {
            extra.extend_from_slice(&ZIP64_EXTRA_TAG.to_le_bytes());
            extra.extend_from_slice(&24u16.to_le_bytes());
            extra.extend_from_slice(&self.size.to_le_bytes());
            extra.extend_from_slice(&self.size.to_le_bytes());
            extra.extend_from_slice(&self.local_off.to_le_bytes());
        }
        let (size32, off32) = if zip64 {
            (SAT32, SAT32)
        } else {
            (self.size as u32, self.local_off as u32)
        };
        let version = if zip64 { VERSION_45 } else { VERSION_20 };

        let mut out = Vec::with_capacity(CENTRAL_LEN + self.name.len() + extra.len());
        out.extend_from_slice(&CENTRAL_SIG.to_le_bytes());
        out.extend_from_slice(&(CREATOR_UNIX | version).to_le_bytes());
        out.extend_from_slice(&version.to_le_bytes());
        out.extend_from_slice(&(FLAG_DESCRIPTOR | FLAG_UTF8).to_le_bytes());
        out.extend_from_slice(&METHOD_STORED.to_le_bytes());
        out.extend_from_slice(&self.dos_time.to_le_bytes());
        out.extend_from_slice(&self.dos_date.to_le_bytes());
        out.extend_from_slice(&self.crc32.to_le_bytes());
        out.extend_from_slice(&size32.to_le_bytes());
        out.extend_from_slice(&size32.to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // comment
        out.extend_from_slice(&0u16.to_le_bytes()); // disk
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        let attrs = if self.is_dir { DIR_ATTRS } else { FILE_ATTRS };
        out.extend_from_slice(&attrs.to_le_bytes());
        out.extend_from_slice(&off32.to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&extra);
        out
    }
}

/// Streams a ZIP archive whose members all use the stored method.
///
/// Members are written as local header, raw bytes, data descriptor; sizes
/// and CRC-32 are computed while copying, so inputs need not be seekable.
/// Offsets in the written directory are positions in whatever `W` receives,
/// which for a `SeekableWriter` sink are logical offsets.
pub struct ZipBuilder<W: Write> {
    out: CountingWriter<W>,
    records: Vec<Record>,
    names: HashSet<String>,
}

impl<W: Write> ZipBuilder<W> {
    pub fn new(sink: W) -> Self {
        Self {
            out: CountingWriter::new(sink),
            records: Vec::new(),
            names: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.len() > SAT16 as usize {
            return Err(SeekError::Config(format!("invalid member name length: {name:?}")));
        }
        if name.starts_with('/') || name.contains('\\') || name.contains('\0') {
            return Err(SeekError::Config(format!("invalid member name: {name:?}")));
        }
        if name.trim_end_matches('/').split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return Err(SeekError::Config(format!("invalid path component in {name:?}")));
        }
        if self.names.contains(name) {
            return Err(SeekError::Config(format!("duplicate member name: {name:?}")));
        }
        Ok(())
    }

    /// Local header with crc and sizes deferred to the data descriptor. File
    /// members carry a zero-filled ZIP64 extra, which tells readers that their
    /// descriptor holds 8-byte sizes; their size is unknown until copied.
    fn write_local_header(
        &mut self,
        name: &str,
        dos_date: u16,
        dos_time: u16,
        zip64: bool,
    ) -> Result<()> {
        let extra_len: u16 = if zip64 { 20 } else { 0 };
        let version = if zip64 { VERSION_45 } else { VERSION_20 };
        let size32 = if zip64 { SAT32 } else { 0 };
        let mut h = Vec::with_capacity(LOCAL_LEN + name.len() + extra_len as usize);
        h.extend_from_slice(&LOCAL_SIG.to_le_bytes());
        h.extend_from_slice(&version.to_le_bytes());
        h.extend_from_slice(&(FLAG_DESCRIPTOR | FLAG_UTF8).to_le_bytes());
        h.extend_from_slice(&METHOD_STORED.to_le_bytes());
        h.extend_from_slice(&dos_time.to_le_bytes());
        h.extend_from_slice(&dos_date.to_le_bytes());
        h.extend_from_slice(&0u32.to_le_bytes()); // crc
        h.extend_from_slice(&size32.to_le_bytes());
        h.extend_from_slice(&size32.to_le_bytes());
        h.extend_from_slice(&(name.len() as u16).to_le_bytes());
        h.extend_from_slice(&extra_len.to_le_bytes());
        h.extend_from_slice(name.as_bytes());
        if zip64 {
            h.extend_from_slice(&ZIP64_EXTRA_TAG.to_le_bytes());
            h.extend_from_slice(&16u16.to_le_bytes());
            h.extend_from_slice(&[0u8; 16]);
        }
        self.out.write_all(&h).map_err(from_io)
    }

    fn write_descriptor(&mut self, crc32: u32, size: u64, zip64: bool) -> Result<()> {
        let mut d = Vec::with_capacity(24);
        d.extend_from_slice(&DESCRIPTOR_SIG.to_le_bytes());
        d.extend_from_slice(&crc32.to_le_bytes());
        if zip64 {
            d.extend_from_slice(&size.to_le_bytes());
            d.extend_from_slice(&size.to_le_bytes());
        } else {
            d.extend_from_slice(&(size as u32).to_le_bytes());
            d.extend_from_slice(&(size as u32).to_le_bytes());
        }
        self.out.write_all(&d).map_err(from_io)
    }

    /// Copy `data` to the archive as member `name`. Returns its size.
    pub fn add_file<R: Read + ?Sized>(
        &mut self,
        name: &str,
        data: &mut R,
        modified: Option<OffsetDateTime>,
    ) -> Result<u64> {
        self.check_name(name)?;
        if name.ends_with('/') {
            return Err(SeekError::Config(format!("file name ends with '/': {name:?}")));
        }
        let local_off = self.out.count();
        let (dos_date, dos_time) = modified.map_or((DOS_EPOCH_DATE, 0), datetime_to_dos);
        self.write_local_header(name, dos_date, dos_time, true)?;

        let mut hasher = crc32fast::Hasher::new();
        let size = {
            let mut fwd = CrcForward::new(&mut self.out, &mut hasher);
            std::io::copy(data, &mut fwd).map_err(from_io)?;
            fwd.counted
        };
        let crc32 = hasher.finalize();
        self.write_descriptor(crc32, size, true)?;

        self.names.insert(name.to_string());
        self.records.push(Record {
            name: name.to_string(),
            local_off,
            crc32,
            size,
            dos_date,
            dos_time,
            is_dir: false,
        });
        Ok(size)
    }

    /// Record an explicit directory member; a trailing `/` is added if missing.
    pub fn add_dir(&mut self, name: &str, modified: Option<OffsetDateTime>) -> Result<()> {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };
        self.check_name(&name)?;
        let local_off = self.out.count();
        let (dos_date, dos_time) = modified.map_or((DOS_EPOCH_DATE, 0), datetime_to_dos);
        self.write_local_header(&name, dos_date, dos_time, false)?;
        self.write_descriptor(0, 0, false)?;
        self.names.insert(name.clone());
        self.records.push(Record {
            name,
            local_off,
            crc32: 0,
            size: 0,
            dos_date,
            dos_time,
            is_dir: true,
        });
        Ok(())
    }

    /// Write the central directory and end records, then hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        let cd_off = self.out.count();
        for rec in &self.records {
            let bytes = rec.encode_central();
            self.out.write_all(&bytes).map_err(from_io)?;
        }
        let end = DirectoryEnd {
            records: self.records.len() as u64,
            cd_size: self.out.count() - cd_off,
            cd_off,
            comment_len: 0,
        };
        if end.needs_zip64() {
            let zip64_off = self.out.count();
            self.out
                .write_all(&end.encode_zip64(zip64_off))
                .map_err(from_io)?;
        }
        self.out.write_all(&end.encode()).map_err(from_io)?;
        self.out.flush().map_err(from_io)?;
        Ok(self.out.into_inner())
    }
}
