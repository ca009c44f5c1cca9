//! Error types for clevert-core

use clevert_archive::ArchiveError;
use thiserror::Error;

/// Result type alias using clevert-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Clevert
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure while transferring a file
    #[error("Transfer of {url} failed: {message}")]
    Transfer { url: String, message: String },

    /// Server answered with a non-success status
    #[error("Transfer of {url} failed with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    /// Archive reader error
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Entries spec is missing fields or out of bounds
    #[error("Invalid entries: {message}")]
    InvalidEntries { message: String },

    /// Asset kind the installer cannot unpack
    #[error("Unsupported asset kind: {kind}")]
    UnsupportedAssetKind { kind: String },

    /// Entry strategy the enumerator does not know
    #[error("Unsupported entries kind: {kind}")]
    UnsupportedEntryKind { kind: String },

    /// Host OS/architecture has no platform name
    #[error("Unsupported platform: {os}-{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Manifest failed validation
    #[error("Invalid extension manifest: {message}")]
    InvalidManifest { message: String },

    /// No installed extension with this id and version
    #[error("Extension not found: {id}_{version}")]
    ExtensionNotFound { id: String, version: String },

    /// Another install of the same extension version is still running
    #[error("Extension {extension} is already being installed")]
    InstallInProgress { extension: String },

    /// Extension does not declare the action
    #[error("Action {action} not found in extension {extension}")]
    ActionNotFound { extension: String, action: String },

    /// Extension does not declare the profile
    #[error("Profile not found: {profile}")]
    ProfileNotFound { profile: String },

    /// An action's execute failed
    #[error("Execution failed: {message}")]
    Execution { message: String },

    /// Operation was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl Error {
    /// Create a transfer error
    pub fn transfer(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transfer {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid manifest error
    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            message: message.into(),
        }
    }

    /// Create an invalid entries error
    pub fn invalid_entries(message: impl Into<String>) -> Self {
        Self::InvalidEntries {
            message: message.into(),
        }
    }

    /// Create an extension not found error
    pub fn extension_not_found(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self::ExtensionNotFound {
            id: id.into(),
            version: version.into(),
        }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
