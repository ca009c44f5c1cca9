//! Central directory entries

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{ArchiveError, Result};

/// Central directory file header signature (`PK\x01\x02`)
pub(crate) const CENSIG: u32 = 0x0201_4b50;

/// Fixed part of a central directory file header
pub(crate) const CENHDR: usize = 46;

/// Zip64 extended information extra field id
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// 32-bit sentinel meaning "see the zip64 extra field"
pub(crate) const ZIP64_SENTINEL_32: u32 = u32::MAX;

/// General purpose flag: entry is encrypted
const FLAG_ENCRYPTED: u16 = 0x0001;

/// "Version made by" host system for unix
const HOST_UNIX: u16 = 3;

/// Compression method: stored
pub const METHOD_STORED: u16 = 0;

/// Compression method: deflate
pub const METHOD_DEFLATED: u16 = 8;

/// One entry of the central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// Entry name, `/`-separated; directories end with `/`
    pub name: String,

    /// General purpose bit flags
    pub flags: u16,

    /// Compression method
    pub method: u16,

    /// MS-DOS time (low 16 bits) and date (high 16 bits)
    pub dos_time: u32,

    /// Recorded CRC-32 of the uncompressed data
    pub crc32: u32,

    /// Compressed size in bytes
    pub compressed_size: u64,

    /// Uncompressed size in bytes
    pub size: u64,

    /// Offset of the local file header
    pub header_offset: u64,

    /// "Version made by" field
    pub version_made_by: u16,

    /// External file attributes
    pub external_attributes: u32,
}

impl ZipEntry {
    /// Parse a central directory header.
    ///
    /// `header` is the fixed 46-byte part, `variable` holds the name, extra
    /// field and comment that follow it.
    pub(crate) fn parse(header: &[u8], variable: &[u8]) -> Result<Self> {
        if header.len() != CENHDR || le_u32(header, 0) != CENSIG {
            return Err(ArchiveError::corrupt("invalid central directory entry header"));
        }

        let name_len = le_u16(header, 28) as usize;
        let extra_len = le_u16(header, 30) as usize;
        if variable.len() < name_len + extra_len {
            return Err(ArchiveError::corrupt("truncated central directory entry"));
        }

        let name = String::from_utf8_lossy(&variable[..name_len]).into_owned();
        let extra = &variable[name_len..name_len + extra_len];

        let mut entry = Self {
            name,
            flags: le_u16(header, 8),
            method: le_u16(header, 10),
            dos_time: le_u32(header, 12),
            crc32: le_u32(header, 16),
            compressed_size: le_u32(header, 20) as u64,
            size: le_u32(header, 24) as u64,
            header_offset: le_u32(header, 42) as u64,
            version_made_by: le_u16(header, 4),
            external_attributes: le_u32(header, 38),
        };
        entry.apply_zip64_extra(
            extra,
            le_u32(header, 24),
            le_u32(header, 20),
            le_u32(header, 42),
        )?;

        Ok(entry)
    }

    /// Replace sentinel values with the 64-bit values from the zip64 extra field
    fn apply_zip64_extra(
        &mut self,
        mut extra: &[u8],
        size: u32,
        compressed_size: u32,
        offset: u32,
    ) -> Result<()> {
        while extra.len() >= 4 {
            let id = le_u16(extra, 0);
            let len = le_u16(extra, 2) as usize;
            if extra.len() < 4 + len {
                return Err(ArchiveError::corrupt(format!(
                    "truncated extra field in entry {}",
                    self.name
                )));
            }
            let data = &extra[4..4 + len];

            if id == ZIP64_EXTRA_ID {
                // Fields are present only for the values that hit the sentinel, in this order
                let mut pos = 0;
                let mut next = |field: &str| -> Result<u64> {
                    if data.len() < pos + 8 {
                        return Err(ArchiveError::corrupt(format!(
                            "zip64 extra field of {} lacks {}",
                            self.name, field
                        )));
                    }
                    let value = le_u64(data, pos);
                    pos += 8;
                    Ok(value)
                };
                let size64 = (size == ZIP64_SENTINEL_32).then(|| next("size")).transpose()?;
                let compressed64 = (compressed_size == ZIP64_SENTINEL_32)
                    .then(|| next("compressed size"))
                    .transpose()?;
                let offset64 = (offset == ZIP64_SENTINEL_32)
                    .then(|| next("header offset"))
                    .transpose()?;

                if let Some(value) = size64 {
                    self.size = value;
                }
                if let Some(value) = compressed64 {
                    self.compressed_size = value;
                }
                if let Some(value) = offset64 {
                    self.header_offset = value;
                }
            }

            extra = &extra[4 + len..];
        }
        Ok(())
    }

    /// Whether this entry is a directory
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Whether this entry is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Number of path segments, used to create directories shallowest first
    pub fn depth(&self) -> usize {
        self.name.split('/').filter(|s| !s.is_empty()).count()
    }

    /// Last modification time decoded from the MS-DOS timestamp
    pub fn modified(&self) -> Option<NaiveDateTime> {
        let time = self.dos_time & 0xffff;
        let date = self.dos_time >> 16;

        let year = ((date >> 9) & 0x7f) as i32 + 1980;
        let month = (date >> 5) & 0x0f;
        let day = date & 0x1f;
        let hour = (time >> 11) & 0x1f;
        let minute = (time >> 5) & 0x3f;
        let second = (time & 0x1f) * 2;

        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
    }

    /// Unix permission bits, when the archive was created on a unix host
    pub fn unix_mode(&self) -> Option<u32> {
        if self.version_made_by >> 8 != HOST_UNIX {
            return None;
        }
        let mode = self.external_attributes >> 16;
        (mode != 0).then_some(mode & 0o7777)
    }
}

/// Reject names that could escape the extraction root
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let has_drive_prefix = name
        .split_once(':')
        .map(|(head, _)| !head.is_empty() && head.chars().all(|c| c.is_alphanumeric() || c == '_'))
        .unwrap_or(false);

    if name.contains('\\')
        || name.starts_with('/')
        || has_drive_prefix
        || name.split('/').any(|segment| segment == "..")
    {
        return Err(ArchiveError::malicious(name));
    }
    Ok(())
}

pub(crate) fn le_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn le_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

pub(crate) fn le_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
