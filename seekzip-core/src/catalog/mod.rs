//! Directory catalog: the ZIP central directory of an archive, resolved
//! to logical offsets through random-access reads only.

pub mod builder;
pub mod zipfmt;

use crate::error::{Result, SeekError};
use crate::read::reader::SeekableReader;
use serde::Serialize;
use std::collections::HashMap;
use time::OffsetDateTime;
use tracing::debug;
use zipfmt::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMethod {
    Stored,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    /// Member name; directories are recorded without their trailing `/`.
    pub name: String,
    /// Logical offset of the member's first data byte.
    pub offset: u64,
    pub size: u64,
    pub method: StorageMethod,
    pub crc32: u32,
    pub is_dir: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub modified: Option<OffsetDateTime>,
}

impl DirectoryEntry {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<DirectoryEntry>,
    by_name: HashMap<String, usize>,
    comment: String,
}

fn bad(msg: impl Into<String>) -> SeekError {
    SeekError::InvalidFormat(msg.into())
}

impl Catalog {
    /// Locate and parse the central directory at the logical end of `reader`.
    ///
    /// Any member that is not stored uncompressed fails the whole parse with
    /// `UnsupportedEntry`; data ranges must lie inside the logical space.
    pub fn parse(reader: &SeekableReader) -> Result<Catalog> {
        let size = reader.size();
        let scan = size.min((EOCD_LEN + MAX_COMMENT) as u64);
        if scan < EOCD_LEN as u64 {
            return Err(bad("too small to hold a zip directory"));
        }
        let base = size - scan;
        let mut tail = vec![0u8; scan as usize];
        reader.read_exact_at(base, &mut tail)?;
        let at = find_eocd(&tail).ok_or_else(|| bad("end of central directory not found"))?;
        let eocd_off = base + at as u64;
        let mut end = DirectoryEnd::parse(&tail[at..]).ok_or_else(|| bad("truncated end record"))?;
        let comment_start = at + EOCD_LEN;
        let comment = String::from_utf8_lossy(
            &tail[comment_start..comment_start + end.comment_len as usize],
        )
        .into_owned();

        // directory end: where the central directory must stop
        let mut cd_limit = eocd_off;
        if eocd_off >= ZIP64_LOCATOR_LEN as u64 {
            let mut loc = [0u8; ZIP64_LOCATOR_LEN];
            reader.read_exact_at(eocd_off - ZIP64_LOCATOR_LEN as u64, &mut loc)?;
            if let Some(z64_off) = parse_zip64_locator(&loc) {
                let limit = eocd_off - ZIP64_LOCATOR_LEN as u64;
                if z64_off.checked_add(ZIP64_EOCD_LEN as u64).is_none_or(|e| e > limit) {
                    return Err(bad("zip64 end record out of bounds"));
                }
                let mut rec = [0u8; ZIP64_EOCD_LEN];
                reader.read_exact_at(z64_off, &mut rec)?;
                parse_zip64_end(&rec, &mut end).ok_or_else(|| bad("malformed zip64 end record"))?;
                cd_limit = z64_off;
            }
        }

        if end.cd_off.checked_add(end.cd_size).is_none_or(|e| e > cd_limit) {
            return Err(bad(format!(
                "central directory {}+{} overruns its end record at {cd_limit}",
                end.cd_off, end.cd_size
            )));
        }
        let cd_len =
            usize::try_from(end.cd_size).map_err(|_| bad("central directory too large"))?;
        let mut cd = vec![0u8; cd_len];
        reader.read_exact_at(end.cd_off, &mut cd)?;

        let mut cat = Catalog {
            comment,
            ..Default::default()
        };
        let mut r = Le::new(&cd);
        while r.remaining() > 0 {
            let entry = Self::parse_record(reader, &mut r, size)?;
            let idx = cat.entries.len();
            cat.by_name.entry(entry.name.clone()).or_insert(idx);
            cat.entries.push(entry);
        }
        if cat.entries.len() as u64 % 0x1_0000 != end.records % 0x1_0000 {
            return Err(bad(format!(
                "central directory holds {} records, end record claims {}",
                cat.entries.len(),
                end.records
            )));
        }
        debug!(
            entries = cat.entries.len(),
            cd_off = end.cd_off,
            cd_size = end.cd_size,
            "parsed catalog"
        );
        Ok(cat)
    }

    fn parse_record(reader: &SeekableReader, r: &mut Le<'_>, size: u64) -> Result<DirectoryEntry> {
        let mut h = CentralHeader::parse(r).ok_or_else(|| bad("malformed central directory record"))?;
        let raw_name = r.bytes(h.name_len).ok_or_else(|| bad("truncated member name"))?;
        let extra = r.bytes(h.extra_len).ok_or_else(|| bad("truncated extra field"))?;
        r.bytes(h.comment_len).ok_or_else(|| bad("truncated member comment"))?;
        let name = String::from_utf8_lossy(raw_name).into_owned();
        h.apply_zip64_extra(extra)
            .ok_or_else(|| bad(format!("malformed zip64 extra field for {name:?}")))?;

        if h.method != METHOD_STORED || h.flags & FLAG_ENCRYPTED != 0 {
            return Err(SeekError::UnsupportedEntry {
                name,
                method: h.method,
            });
        }
        if h.c_size != h.u_size {
            return Err(bad(format!("stored member {name:?} has differing sizes")));
        }

        if h.local_off.checked_add(LOCAL_LEN as u64).is_none_or(|e| e > size) {
            return Err(bad(format!("local header of {name:?} out of bounds")));
        }
        let mut local = [0u8; LOCAL_LEN];
        reader.read_exact_at(h.local_off, &mut local)?;
        let (n, e) =
            parse_local_header(&local).ok_or_else(|| bad(format!("bad local header for {name:?}")))?;
        let offset = h.local_off + (LOCAL_LEN + n + e) as u64;
        if offset.checked_add(h.u_size).is_none_or(|end| end > size) {
            return Err(bad(format!(
                "member {name:?} ({offset}+{}) extends past the archive ({size})",
                h.u_size
            )));
        }

        let is_dir = name.ends_with('/');
        Ok(DirectoryEntry {
            name: if is_dir {
                name.trim_end_matches('/').to_string()
            } else {
                name
            },
            offset,
            size: h.u_size,
            method: StorageMethod::Stored,
            crc32: h.crc32,
            is_dir,
            modified: dos_to_datetime(h.mod_date, h.mod_time),
        })
    }

    /// Exact-name lookup. With duplicate names the first record wins.
    pub fn get(&self, name: &str) -> Option<&DirectoryEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// All entries in central-directory order.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }
}

#[cfg(test)]
mod tests {
    use super::builder::ZipBuilder;
    use super::*;
    use crate::codec::store::Store;
    use crate::codec::zstdc::ZstdCompressor;
    use crate::options::{ReaderOptions, WriterOptions};
    use crate::pack::writer::SeekableWriter;
    use crate::source::MemSource;
    use time::macros::datetime;

    fn wrap(zip: &[u8], frame_size: usize) -> SeekableReader {
        let opts = WriterOptions {
            frame_size,
            ..Default::default()
        };
        let mut w = SeekableWriter::new(Vec::new(), Box::new(ZstdCompressor), opts).unwrap();
        w.write_bytes(zip).unwrap();
        let bytes = w.finish().unwrap();
        SeekableReader::open(
            Box::new(MemSource::new(bytes)),
            Box::new(ZstdCompressor),
            &ReaderOptions::default(),
        )
        .unwrap()
    }

    fn sample_zip() -> Vec<u8> {
        let mut b = ZipBuilder::new(Vec::new());
        b.add_file("a.txt", &mut &b"hello"[..], Some(datetime!(2023-06-01 12:00 UTC)))
            .unwrap();
        b.add_dir("dir", None).unwrap();
        b.add_file("dir/b.md", &mut &b"world"[..], None).unwrap();
        b.finish().unwrap()
    }

    #[test]
    fn resolves_members_to_logical_ranges() {
        let r = wrap(&sample_zip(), 16);
        let cat = Catalog::parse(&r).unwrap();
        assert_eq!(cat.len(), 3);

        let a = cat.get("a.txt").unwrap();
        assert_eq!(r.read_at(a.offset, a.size).unwrap(), b"hello");
        assert_eq!(a.crc32, crc32fast::hash(b"hello"));
        assert_eq!(a.modified, Some(datetime!(2023-06-01 12:00 UTC)));

        let b = cat.get("dir/b.md").unwrap();
        assert_eq!(r.read_at(b.offset, b.size).unwrap(), b"world");

        let d = cat.get("dir").unwrap();
        assert!(d.is_dir);
        assert_eq!(d.size, 0);
        assert!(cat.get("missing").is_none());
        assert_eq!(
            cat.entries().iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            ["a.txt", "dir", "dir/b.md"]
        );
    }

    #[test]
    fn entries_serialize_for_listings() {
        let cat = Catalog::parse(&wrap(&sample_zip(), 16)).unwrap();
        let v = serde_json::to_value(cat.get("a.txt").unwrap()).unwrap();
        assert_eq!(v["name"], "a.txt");
        assert_eq!(v["size"], 5);
        assert_eq!(v["method"], "stored");
        assert_eq!(v["is_dir"], false);
        assert_eq!(v["modified"], "2023-06-01T12:00:00Z");
        let d = serde_json::to_value(cat.get("dir").unwrap()).unwrap();
        assert_eq!(d["is_dir"], true);
        assert!(d["modified"].is_string());
    }

    #[test]
    fn empty_zip_has_no_entries() {
        let zip = ZipBuilder::new(Vec::new()).finish().unwrap();
        let cat = Catalog::parse(&wrap(&zip, 64)).unwrap();
        assert!(cat.is_empty());
    }

    #[test]
    fn non_zip_payload_is_invalid_format() {
        let r = wrap(&[7u8; 300], 64);
        assert!(matches!(Catalog::parse(&r), Err(SeekError::InvalidFormat(_))));
        let r = wrap(b"tiny", 64);
        assert!(matches!(Catalog::parse(&r), Err(SeekError::InvalidFormat(_))));
    }

    #[test]
    fn deflated_member_is_rejected() {
        let mut zip = sample_zip();
        let at = find_eocd(&zip).unwrap();
        let end = DirectoryEnd::parse(&zip[at..]).unwrap();
        // method field of the first central record
        let m = end.cd_off as usize + 10;
        zip[m..m + 2].copy_from_slice(&8u16.to_le_bytes());
        match Catalog::parse(&wrap(&zip, 32)) {
            Err(SeekError::UnsupportedEntry { name, method }) => {
                assert_eq!(name, "a.txt");
                assert_eq!(method, 8);
            }
            other => panic!("expected UnsupportedEntry, got {other:?}"),
        }
    }

    #[test]
    fn encrypted_member_is_rejected() {
        let mut zip = sample_zip();
        let at = find_eocd(&zip).unwrap();
        let end = DirectoryEnd::parse(&zip[at..]).unwrap();
        let f = end.cd_off as usize + 8;
        let flags = u16::from_le_bytes([zip[f], zip[f + 1]]) | FLAG_ENCRYPTED;
        zip[f..f + 2].copy_from_slice(&flags.to_le_bytes());
        assert!(matches!(
            Catalog::parse(&wrap(&zip, 32)),
            Err(SeekError::UnsupportedEntry { method: 0, .. })
        ));
    }

    #[test]
    fn member_past_end_is_invalid_format() {
        let mut zip = sample_zip();
        let at = find_eocd(&zip).unwrap();
        let end = DirectoryEnd::parse(&zip[at..]).unwrap();
        // inflate both size fields of the first record
        let s = end.cd_off as usize + 20;
        zip[s..s + 4].copy_from_slice(&1_000_000u32.to_le_bytes());
        zip[s + 4..s + 8].copy_from_slice(&1_000_000u32.to_le_bytes());
        assert!(matches!(
            Catalog::parse(&wrap(&zip, 32)),
            Err(SeekError::InvalidFormat(_))
        ));
    }

    #[test]
    fn trailing_comment_is_skipped() {
        let mut zip = sample_zip();
        let len = zip.len();
        zip[len - 2..].copy_from_slice(&7u16.to_le_bytes());
        zip.extend_from_slice(b"comment");
        let cat = Catalog::parse(&wrap(&zip, 4096)).unwrap();
        assert_eq!(cat.comment(), "comment");
        assert_eq!(cat.len(), 3);
    }

    #[test]
    fn parses_over_store_codec() {
        let zip = sample_zip();
        let mut w = SeekableWriter::new(Vec::new(), Box::new(Store), WriterOptions::default())
            .unwrap();
        w.write_bytes(&zip).unwrap();
        let r = SeekableReader::open(
            Box::new(MemSource::new(w.finish().unwrap())),
            Box::new(Store),
            &ReaderOptions::default(),
        )
        .unwrap();
        let cat = Catalog::parse(&r).unwrap();
        // stored members inside a store-codec stream sit at their zip offsets
        assert_eq!(&zip[cat.get("a.txt").unwrap().offset as usize..][..5], b"hello");
    }
}
