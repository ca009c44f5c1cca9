//! ZIP archive reader
//!
//! The archive is located from its tail: the end of central directory record
//! sits in the last `22 + comment` bytes, so the reader scans a trailing
//! window backwards and doubles it until the record is found or the maximum
//! comment length is exhausted.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::read::DeflateDecoder;
use tracing::debug;

use crate::entry::{
    le_u16, le_u32, le_u64, validate_name, ZipEntry, CENHDR, METHOD_DEFLATED, METHOD_STORED,
    ZIP64_SENTINEL_32,
};
use crate::error::{ArchiveError, Result};
use crate::verify::CrcVerifier;

/// End of central directory signature (`PK\x05\x06`)
const EOCD_SIG: u32 = 0x0605_4b50;
/// Fixed size of the end of central directory record
const EOCD_LEN: usize = 22;
/// Largest comment the 16-bit length field can declare
const MAX_COMMENT: usize = u16::MAX as usize;
/// First tail window scanned for the end record
const INITIAL_WINDOW: u64 = 1024;

/// Zip64 end of central directory locator signature (`PK\x06\x07`)
const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;
const ZIP64_LOCATOR_LEN: u64 = 20;
/// Zip64 end of central directory record signature (`PK\x06\x06`)
const ZIP64_EOCD_SIG: u32 = 0x0606_4b50;
const ZIP64_EOCD_LEN: usize = 56;

/// Local file header signature (`PK\x03\x04`)
const LOCAL_SIG: u32 = 0x0403_4b50;
const LOCAL_HDR_LEN: usize = 30;

const ZIP64_SENTINEL_16: u16 = u16::MAX;

const COPY_BUFFER: usize = 64 * 1024;

/// Where the central directory lives and how many entries it holds
#[derive(Debug, Clone, Copy)]
struct DirectoryLocation {
    entries: u64,
    size: u64,
    offset: u64,
}

/// An opened ZIP archive with its parsed central directory
#[derive(Debug)]
pub struct ZipArchive {
    path: PathBuf,
    file_size: u64,
    entries: Vec<ZipEntry>,
    comment: Vec<u8>,
}

impl ZipArchive {
    /// Open an archive and parse its central directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_size = file.metadata()?.len();

        if file_size < EOCD_LEN as u64 {
            return Err(ArchiveError::corrupt(format!(
                "file is {} bytes, smaller than an end of central directory record",
                file_size
            )));
        }

        let (eocd_pos, record, comment) = locate_end_record(&mut file, file_size)?;
        let location = read_directory_location(&mut file, eocd_pos, &record)?;

        if location.offset.checked_add(location.size).map_or(true, |end| end > eocd_pos) {
            return Err(ArchiveError::corrupt(format!(
                "central directory ({} bytes at {}) lies outside the archive",
                location.size, location.offset
            )));
        }

        let entries = read_central_directory(&mut file, location)?;
        debug!(
            "Opened {} ({} entries, {} bytes)",
            path.display(),
            entries.len(),
            file_size
        );

        Ok(Self {
            path,
            file_size,
            entries,
            comment,
        })
    }

    /// Path the archive was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in central directory order
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Look up an entry by name; a directory may be named with or without its trailing `/`
    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .or_else(|| {
                let dir = format!("{}/", name.trim_end_matches('/'));
                self.entries.iter().find(|e| e.name == dir)
            })
    }

    /// Archive comment bytes
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Extract into `dest`.
    ///
    /// - `None` extracts the whole archive: directories first (shallowest
    ///   first), then files.
    /// - A file entry is written to `dest`, or to `dest/<basename>` when `dest`
    ///   is an existing directory.
    /// - A directory entry extracts its subtree into `dest` with the entry's
    ///   prefix stripped.
    ///
    /// Returns the number of entries extracted. Any failure aborts the whole
    /// extraction; partially written files are left in place.
    pub fn extract(&self, entry: Option<&str>, dest: impl AsRef<Path>) -> Result<usize> {
        let dest = dest.as_ref();
        let mut file = File::open(&self.path)?;

        match entry {
            None => self.extract_tree(&mut file, "", dest),
            Some(name) => {
                let entry = self.entry(name).ok_or_else(|| ArchiveError::EntryNotFound {
                    name: name.to_string(),
                })?;

                if entry.is_directory() {
                    let prefix = entry.name.clone();
                    self.extract_tree(&mut file, &prefix, dest)
                } else {
                    let target = if dest.is_dir() {
                        let base = entry.name.rsplit('/').next().unwrap_or(&entry.name);
                        dest.join(base)
                    } else {
                        dest.to_path_buf()
                    };
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    self.extract_file(&mut file, entry, &target)?;
                    Ok(1)
                }
            }
        }
    }

    /// Extract every entry below `prefix` (the whole archive for `""`)
    fn extract_tree(&self, file: &mut File, prefix: &str, dest: &Path) -> Result<usize> {
        let selected: Vec<(&ZipEntry, &str)> = self
            .entries
            .iter()
            .filter_map(|e| {
                let relative = e.name.strip_prefix(prefix)?;
                (!relative.is_empty()).then_some((e, relative))
            })
            .collect();

        fs::create_dir_all(dest)?;

        let mut directories: Vec<&(&ZipEntry, &str)> =
            selected.iter().filter(|(e, _)| e.is_directory()).collect();
        directories.sort_by_key(|(e, _)| e.depth());
        for (_, relative) in &directories {
            fs::create_dir_all(dest.join(relative))?;
        }

        for (entry, relative) in selected.iter().filter(|(e, _)| !e.is_directory()) {
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            self.extract_file(file, entry, &target)?;
        }

        debug!(
            "Extracted {} entries from {} into {}",
            selected.len(),
            self.path.display(),
            dest.display()
        );
        Ok(selected.len())
    }

    /// Stream one file entry to `target`, verifying CRC-32 and size
    fn extract_file(&self, file: &mut File, entry: &ZipEntry, target: &Path) -> Result<()> {
        if entry.is_encrypted() {
            return Err(ArchiveError::Encrypted {
                name: entry.name.clone(),
            });
        }
        if entry.method != METHOD_STORED && entry.method != METHOD_DEFLATED {
            return Err(ArchiveError::UnsupportedMethod {
                name: entry.name.clone(),
                method: entry.method,
            });
        }

        let data_offset = self.data_offset(file, entry)?;
        if data_offset
            .checked_add(entry.compressed_size)
            .map_or(true, |end| end > self.file_size)
        {
            return Err(ArchiveError::corrupt(format!(
                "data of {} extends past the end of the archive",
                entry.name
            )));
        }

        file.seek(SeekFrom::Start(data_offset))?;
        let raw = Read::by_ref(file).take(entry.compressed_size);
        let mut reader: Box<dyn Read + '_> = if entry.method == METHOD_DEFLATED {
            Box::new(DeflateDecoder::new(raw))
        } else {
            Box::new(raw)
        };

        let mut out = File::create(target)?;
        let mut verifier = CrcVerifier::new(&entry.name, entry.crc32, entry.size);
        let mut buf = vec![0u8; COPY_BUFFER];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::InvalidData
                            | io::ErrorKind::InvalidInput
                            | io::ErrorKind::UnexpectedEof
                    ) =>
                {
                    return Err(ArchiveError::integrity(&entry.name, e.to_string()));
                }
                Err(e) => return Err(e.into()),
            };
            verifier.update(&buf[..n])?;
            out.write_all(&buf[..n])?;
        }
        verifier.finish()?;
        out.flush()?;

        // DOS timestamps carry no zone; taken as UTC
        if let Some(modified) = entry.modified() {
            out.set_modified(SystemTime::from(modified.and_utc()))?;
        }

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(target, fs::Permissions::from_mode(mode))?;
        }

        Ok(())
    }

    /// Read the local header of `entry` and return where its data begins
    fn data_offset(&self, file: &mut File, entry: &ZipEntry) -> Result<u64> {
        if entry.header_offset + LOCAL_HDR_LEN as u64 > self.file_size {
            return Err(ArchiveError::corrupt(format!(
                "local header of {} lies outside the archive",
                entry.name
            )));
        }
        file.seek(SeekFrom::Start(entry.header_offset))?;
        let mut header = [0u8; LOCAL_HDR_LEN];
        file.read_exact(&mut header)?;
        if le_u32(&header, 0) != LOCAL_SIG {
            return Err(ArchiveError::corrupt(format!(
                "bad local header signature for {}",
                entry.name
            )));
        }
        let name_len = le_u16(&header, 26) as u64;
        let extra_len = le_u16(&header, 28) as u64;
        Ok(entry.header_offset + LOCAL_HDR_LEN as u64 + name_len + extra_len)
    }
}

/// Scan the tail of the file for the end of central directory record.
///
/// A record whose comment ends exactly at the end of the file wins. Once the
/// largest window has been scanned without one, the last record that fits is
/// taken, which tolerates bytes appended after the archive.
///
/// Returns its position, the fixed 22-byte record and the comment.
fn locate_end_record(file: &mut File, file_size: u64) -> Result<(u64, Vec<u8>, Vec<u8>)> {
    let max_window = file_size.min((EOCD_LEN + MAX_COMMENT) as u64);
    let mut window = file_size.min(INITIAL_WINDOW);

    loop {
        let start = file_size - window;
        file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; window as usize];
        file.read_exact(&mut buf)?;

        let last_window = window >= max_window;
        let found = find_end_record(&buf, |end| end == buf.len()).or_else(|| {
            if last_window {
                find_end_record(&buf, |end| end <= buf.len())
            } else {
                None
            }
        });
        if let Some(pos) = found {
            let comment_end = pos + EOCD_LEN + le_u16(&buf, pos + 20) as usize;
            if comment_end != buf.len() {
                debug!(
                    "Ignoring {} bytes after the end of central directory record",
                    buf.len() - comment_end
                );
            }
            let record = buf[pos..pos + EOCD_LEN].to_vec();
            let comment = buf[pos + EOCD_LEN..comment_end].to_vec();
            return Ok((start + pos as u64, record, comment));
        }

        if last_window {
            return Err(ArchiveError::corrupt(
                "end of central directory record not found",
            ));
        }
        window = (window * 2).min(max_window);
    }
}

/// Last position in `buf` holding a signature whose comment end satisfies `accept`
fn find_end_record(buf: &[u8], accept: impl Fn(usize) -> bool) -> Option<usize> {
    if buf.len() < EOCD_LEN {
        return None;
    }
    (0..=buf.len() - EOCD_LEN).rev().find(|&pos| {
        le_u32(buf, pos) == EOCD_SIG && accept(pos + EOCD_LEN + le_u16(buf, pos + 20) as usize)
    })
}

fn read_directory_location(
    file: &mut File,
    eocd_pos: u64,
    record: &[u8],
) -> Result<DirectoryLocation> {
    let entries = le_u16(record, 10);
    let size = le_u32(record, 12);
    let offset = le_u32(record, 16);

    let location = DirectoryLocation {
        entries: entries as u64,
        size: size as u64,
        offset: offset as u64,
    };

    let needs_zip64 =
        entries == ZIP64_SENTINEL_16 || size == ZIP64_SENTINEL_32 || offset == ZIP64_SENTINEL_32;
    if !needs_zip64 || eocd_pos < ZIP64_LOCATOR_LEN {
        return Ok(location);
    }

    file.seek(SeekFrom::Start(eocd_pos - ZIP64_LOCATOR_LEN))?;
    let mut locator = [0u8; ZIP64_LOCATOR_LEN as usize];
    file.read_exact(&mut locator)?;
    if le_u32(&locator, 0) != ZIP64_LOCATOR_SIG {
        // A 16-bit count of exactly 65535 is legal without zip64
        return Ok(location);
    }

    let record_offset = le_u64(&locator, 8);
    if record_offset + ZIP64_EOCD_LEN as u64 > eocd_pos {
        return Err(ArchiveError::corrupt(
            "zip64 end of central directory record lies outside the archive",
        ));
    }
    file.seek(SeekFrom::Start(record_offset))?;
    let mut record64 = [0u8; ZIP64_EOCD_LEN];
    file.read_exact(&mut record64)?;
    if le_u32(&record64, 0) != ZIP64_EOCD_SIG {
        return Err(ArchiveError::corrupt(
            "bad zip64 end of central directory signature",
        ));
    }

    debug!("Using zip64 end of central directory at {}", record_offset);
    Ok(DirectoryLocation {
        entries: le_u64(&record64, 32),
        size: le_u64(&record64, 40),
        offset: le_u64(&record64, 48),
    })
}

fn read_central_directory(file: &mut File, location: DirectoryLocation) -> Result<Vec<ZipEntry>> {
    file.seek(SeekFrom::Start(location.offset))?;
    let mut reader = BufReader::new(file).take(location.size);

    // Each header is at least 46 bytes, which bounds the preallocation
    let capacity = location.entries.min(location.size / CENHDR as u64) as usize;
    let mut entries = Vec::with_capacity(capacity);

    for index in 0..location.entries {
        let mut header = [0u8; CENHDR];
        read_directory_bytes(&mut reader, &mut header, index)?;

        let variable_len =
            le_u16(&header, 28) as usize + le_u16(&header, 30) as usize + le_u16(&header, 32) as usize;
        let mut variable = vec![0u8; variable_len];
        read_directory_bytes(&mut reader, &mut variable, index)?;

        let entry = ZipEntry::parse(&header, &variable)?;
        validate_name(&entry.name)?;
        entries.push(entry);
    }

    Ok(entries)
}

fn read_directory_bytes(reader: &mut impl Read, buf: &mut [u8], index: u64) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ArchiveError::corrupt(format!("central directory truncated at entry {}", index))
        } else {
            ArchiveError::Io(e)
        }
    })
}
