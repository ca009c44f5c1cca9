//! Common test utilities for archive reader tests

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use flate2::write::DeflateEncoder;
use flate2::Compression;

/// 1980-01-01 00:00:00 in MS-DOS format
const DOS_DATE_EPOCH: u16 = 0x0021;

struct FixtureEntry {
    name: Vec<u8>,
    data: Vec<u8>,
    method: u16,
    flags: u16,
    crc_override: Option<u32>,
    directory: bool,
}

/// Hand-rolled ZIP writer so tests control every header field
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<FixtureEntry>,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.push(name.as_bytes(), data, 0, 0, None, false)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.push(name.as_bytes(), data, 8, 0, None, false)
    }

    pub fn directory(self, name: &str) -> Self {
        self.push(name.as_bytes(), b"", 0, 0, None, true)
    }

    /// Entry whose recorded CRC-32 does not match its data
    pub fn with_bad_crc(self, name: &str, data: &[u8]) -> Self {
        let crc = crc32fast::hash(data) ^ 0xffff_ffff;
        self.push(name.as_bytes(), data, 0, 0, Some(crc), false)
    }

    /// Entry declaring an arbitrary compression method; data is written as-is
    pub fn with_method(self, name: &str, data: &[u8], method: u16) -> Self {
        self.push(name.as_bytes(), data, method, 0, None, false)
    }

    /// Entry flagged as encrypted
    pub fn encrypted(self, name: &str, data: &[u8]) -> Self {
        self.push(name.as_bytes(), data, 0, 1, None, false)
    }

    /// Entry with an unchecked name, for path traversal fixtures
    pub fn raw_name(self, name: &[u8], data: &[u8]) -> Self {
        self.push(name, data, 0, 0, None, false)
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Force zip64 records: sentinels in the 32-bit fields, real values in extra fields
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    fn push(
        mut self,
        name: &[u8],
        data: &[u8],
        method: u16,
        flags: u16,
        crc_override: Option<u32>,
        directory: bool,
    ) -> Self {
        self.entries.push(FixtureEntry {
            name: name.to_vec(),
            data: data.to_vec(),
            method,
            flags,
            crc_override,
            directory,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let compressed = if entry.method == 8 {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&entry.data).unwrap();
                encoder.finish().unwrap()
            } else {
                entry.data.clone()
            };
            let crc = entry
                .crc_override
                .unwrap_or_else(|| crc32fast::hash(&entry.data));
            let offset = out.len() as u64;
            let version: u16 = if self.zip64 { 45 } else { 20 };

            // Local file header
            put_u32(&mut out, 0x0403_4b50);
            put_u16(&mut out, version);
            put_u16(&mut out, entry.flags);
            put_u16(&mut out, entry.method);
            put_u16(&mut out, 0);
            put_u16(&mut out, DOS_DATE_EPOCH);
            put_u32(&mut out, crc);
            put_u32(&mut out, compressed.len() as u32);
            put_u32(&mut out, entry.data.len() as u32);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, 0);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&compressed);

            // Central directory header
            let mode: u32 = if entry.directory { 0o040755 } else { 0o100644 };
            put_u32(&mut central, 0x0201_4b50);
            put_u16(&mut central, (3 << 8) | version);
            put_u16(&mut central, version);
            put_u16(&mut central, entry.flags);
            put_u16(&mut central, entry.method);
            put_u16(&mut central, 0);
            put_u16(&mut central, DOS_DATE_EPOCH);
            put_u32(&mut central, crc);
            if self.zip64 {
                put_u32(&mut central, u32::MAX);
                put_u32(&mut central, u32::MAX);
            } else {
                put_u32(&mut central, compressed.len() as u32);
                put_u32(&mut central, entry.data.len() as u32);
            }
            put_u16(&mut central, entry.name.len() as u16);
            put_u16(&mut central, if self.zip64 { 28 } else { 0 });
            put_u16(&mut central, 0);
            put_u16(&mut central, 0);
            put_u16(&mut central, 0);
            put_u32(&mut central, mode << 16);
            put_u32(&mut central, if self.zip64 { u32::MAX } else { offset as u32 });
            central.extend_from_slice(&entry.name);
            if self.zip64 {
                put_u16(&mut central, 0x0001);
                put_u16(&mut central, 24);
                put_u64(&mut central, entry.data.len() as u64);
                put_u64(&mut central, compressed.len() as u64);
                put_u64(&mut central, offset);
            }
        }

        let cd_offset = out.len() as u64;
        let cd_size = central.len() as u64;
        out.extend_from_slice(&central);
        let count = self.entries.len() as u64;

        if self.zip64 {
            let record_offset = out.len() as u64;
            put_u32(&mut out, 0x0606_4b50);
            put_u64(&mut out, 44);
            put_u16(&mut out, 45);
            put_u16(&mut out, 45);
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
            put_u64(&mut out, count);
            put_u64(&mut out, count);
            put_u64(&mut out, cd_size);
            put_u64(&mut out, cd_offset);

            put_u32(&mut out, 0x0706_4b50);
            put_u32(&mut out, 0);
            put_u64(&mut out, record_offset);
            put_u32(&mut out, 1);
        }

        put_u32(&mut out, 0x0605_4b50);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        if self.zip64 {
            put_u16(&mut out, u16::MAX);
            put_u16(&mut out, u16::MAX);
            put_u32(&mut out, u32::MAX);
            put_u32(&mut out, u32::MAX);
        } else {
            put_u16(&mut out, count as u16);
            put_u16(&mut out, count as u16);
            put_u32(&mut out, cd_size as u32);
            put_u32(&mut out, cd_offset as u32);
        }
        put_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);

        out
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Recursively list files (relative, `/`-separated) under `root`
pub fn list_files(root: &Path) -> Vec<String> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path.strip_prefix(root).unwrap();
                out.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    if root.exists() {
        walk(root, root, &mut out);
    }
    out.sort();
    out
}
