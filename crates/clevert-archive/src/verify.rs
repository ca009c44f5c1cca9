//! CRC-32 and size verification for extracted entry data

use crc32fast::Hasher;

use crate::error::{ArchiveError, Result};

/// Tracks the checksum and length of decompressed bytes as they stream past
pub(crate) struct CrcVerifier<'a> {
    name: &'a str,
    expected_crc: u32,
    expected_size: u64,
    hasher: Hasher,
    seen: u64,
}

impl<'a> CrcVerifier<'a> {
    pub(crate) fn new(name: &'a str, expected_crc: u32, expected_size: u64) -> Self {
        Self {
            name,
            expected_crc,
            expected_size,
            hasher: Hasher::new(),
            seen: 0,
        }
    }

    /// Feed a chunk; fails as soon as more bytes arrive than the entry declares
    pub(crate) fn update(&mut self, chunk: &[u8]) -> Result<()> {
        self.seen += chunk.len() as u64;
        if self.seen > self.expected_size {
            return Err(ArchiveError::integrity(
                self.name,
                format!(
                    "decompressed data exceeds declared size of {} bytes",
                    self.expected_size
                ),
            ));
        }
        self.hasher.update(chunk);
        Ok(())
    }

    /// Check the final size and checksum
    pub(crate) fn finish(self) -> Result<()> {
        if self.seen != self.expected_size {
            return Err(ArchiveError::integrity(
                self.name,
                format!(
                    "size mismatch: expected {} bytes, got {}",
                    self.expected_size, self.seen
                ),
            ));
        }
        let actual = self.hasher.finalize();
        if actual != self.expected_crc {
            return Err(ArchiveError::integrity(
                self.name,
                format!(
                    "CRC-32 mismatch: expected {:08x}, got {:08x}",
                    self.expected_crc, actual
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_data_passes() {
        let data = b"hello world";
        let mut verifier = CrcVerifier::new("a.txt", crc32fast::hash(data), data.len() as u64);
        verifier.update(&data[..5]).unwrap();
        verifier.update(&data[5..]).unwrap();
        verifier.finish().unwrap();
    }

    #[test]
    fn test_crc_mismatch() {
        let data = b"hello world";
        let mut verifier = CrcVerifier::new("a.txt", 0xdeadbeef, data.len() as u64);
        verifier.update(data).unwrap();
        assert!(matches!(
            verifier.finish(),
            Err(ArchiveError::IntegrityError { .. })
        ));
    }

    #[test]
    fn test_overflow_detected_early() {
        let mut verifier = CrcVerifier::new("a.txt", 0, 3);
        assert!(verifier.update(b"abcd").is_err());
    }

    #[test]
    fn test_short_data() {
        let mut verifier = CrcVerifier::new("a.txt", crc32fast::hash(b"ab"), 3);
        verifier.update(b"ab").unwrap();
        assert!(verifier.finish().is_err());
    }
}
