//! Error types for clevert-archive

use thiserror::Error;

/// Result type alias using the archive error type
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Archive reader errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Structural damage: missing end record, bad signatures, out-of-range offsets
    #[error("Corrupt archive: {reason}")]
    CorruptArchive { reason: String },

    /// Entry name would escape the destination directory
    #[error("Malicious entry name: {name}")]
    MaliciousEntry { name: String },

    /// Compression method other than stored or deflate
    #[error("Unsupported compression method {method} for entry {name}")]
    UnsupportedMethod { name: String, method: u16 },

    /// CRC-32 or size mismatch while extracting
    #[error("Integrity check failed for {name}: {reason}")]
    IntegrityError { name: String, reason: String },

    /// Entry uses traditional or strong encryption
    #[error("Entry is encrypted: {name}")]
    Encrypted { name: String },

    /// Requested entry is not in the central directory
    #[error("Entry not found: {name}")]
    EntryNotFound { name: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Create a corrupt archive error
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptArchive {
            reason: reason.into(),
        }
    }

    /// Create a malicious entry error
    pub fn malicious(name: impl Into<String>) -> Self {
        Self::MaliciousEntry { name: name.into() }
    }

    /// Create an integrity error
    pub fn integrity(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IntegrityError {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
