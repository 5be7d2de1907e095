//! ZIP record layouts (PKWARE APPNOTE 6.3), little-endian throughout.

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

pub const LOCAL_SIG: u32 = 0x0403_4b50;
pub const CENTRAL_SIG: u32 = 0x0201_4b50;
pub const EOCD_SIG: u32 = 0x0605_4b50;
pub const ZIP64_EOCD_SIG: u32 = 0x0606_4b50;
pub const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;
pub const DESCRIPTOR_SIG: u32 = 0x0807_4b50;

pub const LOCAL_LEN: usize = 30;
pub const CENTRAL_LEN: usize = 46;
pub const EOCD_LEN: usize = 22;
pub const ZIP64_EOCD_LEN: usize = 56;
pub const ZIP64_LOCATOR_LEN: usize = 20;
pub const MAX_COMMENT: usize = u16::MAX as usize;

pub const ZIP64_EXTRA_TAG: u16 = 0x0001;

pub const FLAG_ENCRYPTED: u16 = 0x0001;
pub const FLAG_DESCRIPTOR: u16 = 0x0008;
pub const FLAG_UTF8: u16 = 0x0800;

pub const METHOD_STORED: u16 = 0;

pub const VERSION_20: u16 = 20;
pub const VERSION_45: u16 = 45;
/// Upper byte 3 = Unix attribute compatibility.
pub const CREATOR_UNIX: u16 = 3 << 8;

/// 1980-01-01, the earliest MS-DOS date.
pub const DOS_EPOCH_DATE: u16 = (1 << 5) | 1;

pub const SAT16: u16 = u16::MAX;
pub const SAT32: u32 = u32::MAX;

/// Cursor over a record's bytes. Callers check lengths up front.
pub struct Le<'a> {
    buf: &'a [u8],
}

impl<'a> Le<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            return None;
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Some(head)
    }

    pub fn u16(&mut self) -> Option<u16> {
        self.bytes(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Option<u32> {
        self.bytes(4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Option<u64> {
        self.bytes(8).map(|b| {
            let mut a = [0u8; 8];
            a.copy_from_slice(b);
            u64::from_le_bytes(a)
        })
    }
}

/// Start of the end-of-central-directory record inside `tail_buf`, scanning
/// backwards so a trailing archive comment is skipped.
pub fn find_eocd(tail_buf: &[u8]) -> Option<usize> {
    if tail_buf.len() < EOCD_LEN {
        return None;
    }
    let sig = EOCD_SIG.to_le_bytes();
    (0..=tail_buf.len() - EOCD_LEN).rev().find(|&i| {
        if tail_buf[i..i + 4] != sig {
            return false;
        }
        let comment_len = u16::from_le_bytes([tail_buf[i + 20], tail_buf[i + 21]]) as usize;
        i + EOCD_LEN + comment_len <= tail_buf.len()
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryEnd {
    pub records: u64,
    pub cd_size: u64,
    pub cd_off: u64,
    pub comment_len: u16,
}

impl DirectoryEnd {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let mut r = Le::new(buf);
        if r.u32()? != EOCD_SIG {
            return None;
        }
        let _disk = r.u16()?;
        let _cd_disk = r.u16()?;
        let _records_here = r.u16()?;
        let records = r.u16()?;
        let cd_size = r.u32()?;
        let cd_off = r.u32()?;
        let comment_len = r.u16()?;
        Some(Self {
            records: records as u64,
            cd_size: cd_size as u64,
            cd_off: cd_off as u64,
            comment_len,
        })
    }

    pub fn needs_zip64(&self) -> bool {
        self.records >= SAT16 as u64 || self.cd_size >= SAT32 as u64 || self.cd_off >= SAT32 as u64
    }

    pub fn encode(&self) -> Vec<u8> {
        let records = self.records.min(SAT16 as u64) as u16;
        let mut out = Vec::with_capacity(EOCD_LEN);
        out.extend_from_slice(&EOCD_SIG.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&records.to_le_bytes());
        out.extend_from_slice(&records.to_le_bytes());
        out.extend_from_slice(&(self.cd_size.min(SAT32 as u64) as u32).to_le_bytes());
        out.extend_from_slice(&(self.cd_off.min(SAT32 as u64) as u32).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    /// ZIP64 end record (56 bytes) followed by its locator (20 bytes).
    pub fn encode_zip64(&self, zip64_off: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(ZIP64_EOCD_LEN + ZIP64_LOCATOR_LEN);
        out.extend_from_slice(&ZIP64_EOCD_SIG.to_le_bytes());
        out.extend_from_slice(&((ZIP64_EOCD_LEN - 12) as u64).to_le_bytes());
        out.extend_from_slice(&(CREATOR_UNIX | VERSION_45).to_le_bytes());
        out.extend_from_slice(&VERSION_45.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&self.records.to_le_bytes());
        out.extend_from_slice(&self.records.to_le_bytes());
        out.extend_from_slice(&self.cd_size.to_le_bytes());
        out.extend_from_slice(&self.cd_off.to_le_bytes());

        out.extend_from_slice(&ZIP64_LOCATOR_SIG.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&zip64_off.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out
    }
}

/// Offset of the ZIP64 end record, if `buf` is a ZIP64 locator.
pub fn parse_zip64_locator(buf: &[u8]) -> Option<u64> {
    let mut r = Le::new(buf);
    if r.u32()? != ZIP64_LOCATOR_SIG {
        return None;
    }
    let _disk = r.u32()?;
    r.u64()
}

/// Override `end` with the 64-bit values of a ZIP64 end record.
pub fn parse_zip64_end(buf: &[u8], end: &mut DirectoryEnd) -> Option<()> {
    let mut r = Le::new(buf);
    if r.u32()? != ZIP64_EOCD_SIG {
        return None;
    }
    let _record_size = r.u64()?;
    let _made_by = r.u16()?;
    let _needed = r.u16()?;
    let _disk = r.u32()?;
    let _cd_disk = r.u32()?;
    let _records_here = r.u64()?;
    end.records = r.u64()?;
    end.cd_size = r.u64()?;
    end.cd_off = r.u64()?;
    Some(())
}

/// Central directory file header, before name/extra/comment resolution.
#[derive(Debug, Clone, Copy)]
pub struct CentralHeader {
    pub flags: u16,
    pub method: u16,
    pub mod_time: u16,
    pub mod_date: u16,
    pub crc32: u32,
    pub c_size: u64,
    pub u_size: u64,
    pub name_len: usize,
    pub extra_len: usize,
    pub comment_len: usize,
    pub local_off: u64,
}

impl CentralHeader {
    pub fn parse(r: &mut Le<'_>) -> Option<Self> {
        if r.u32()? != CENTRAL_SIG {
            return None;
        }
        let _made_by = r.u16()?;
        let _needed = r.u16()?;
        let flags = r.u16()?;
        let method = r.u16()?;
        let mod_time = r.u16()?;
        let mod_date = r.u16()?;
        let crc32 = r.u32()?;
        let c_size = r.u32()? as u64;
        let u_size = r.u32()? as u64;
        let name_len = r.u16()? as usize;
        let extra_len = r.u16()? as usize;
        let comment_len = r.u16()? as usize;
        let _disk_start = r.u16()?;
        let _internal = r.u16()?;
        let _external = r.u32()?;
        let local_off = r.u32()? as u64;
        Some(Self {
            flags,
            method,
            mod_time,
            mod_date,
            crc32,
            c_size,
            u_size,
            name_len,
            extra_len,
            comment_len,
            local_off,
        })
    }

    /// Apply the ZIP64 extended information field: each 64-bit value is
    /// present only when its 32-bit counterpart is saturated.
    pub fn apply_zip64_extra(&mut self, extra: &[u8]) -> Option<()> {
        let mut r = Le::new(extra);
        while r.remaining() >= 4 {
            let tag = r.u16()?;
            let size = r.u16()? as usize;
            let body = r.bytes(size)?;
            if tag != ZIP64_EXTRA_TAG {
                continue;
            }
            let mut f = Le::new(body);
            if self.u_size == SAT32 as u64 {
                self.u_size = f.u64()?;
            }
            if self.c_size == SAT32 as u64 {
                self.c_size = f.u64()?;
            }
            if self.local_off == SAT32 as u64 {
                self.local_off = f.u64()?;
            }
        }
        Some(())
    }
}

/// Name and extra lengths of a local file header; data follows them.
pub fn parse_local_header(buf: &[u8]) -> Option<(usize, usize)> {
    let mut r = Le::new(buf);
    if r.u32()? != LOCAL_SIG {
        return None;
    }
    r.bytes(22)?;
    let name_len = r.u16()? as usize;
    let extra_len = r.u16()? as usize;
    Some((name_len, extra_len))
}

/// MS-DOS date/time fields to a UTC timestamp; `None` for invalid values.
pub fn dos_to_datetime(date: u16, time: u16) -> Option<OffsetDateTime> {
    let year = 1980 + (date >> 9) as i32;
    let month = Month::try_from(((date >> 5) & 0x0f) as u8).ok()?;
    let day = (date & 0x1f) as u8;
    let d = Date::from_calendar_date(year, month, day).ok()?;
    let t = Time::from_hms(
        (time >> 11) as u8,
        ((time >> 5) & 0x3f) as u8,
        ((time & 0x1f) * 2) as u8,
    )
    .ok()?;
    Some(PrimitiveDateTime::new(d, t).assume_utc())
}

/// Timestamp to MS-DOS `(date, time)`; instants before 1980 clamp to 1980-01-01.
pub fn datetime_to_dos(dt: OffsetDateTime) -> (u16, u16) {
    if dt.year() < 1980 {
        return (DOS_EPOCH_DATE, 0);
    }
    let year = (dt.year() - 1980).min(127) as u16;
    let date = (year << 9) | ((u8::from(dt.month()) as u16) << 5) | dt.day() as u16;
    let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
    (date, time)
}
