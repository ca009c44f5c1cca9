//! Version information for the clevert CLI

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub version: String,

    /// Git commit SHA (short), when provided at build time
    pub commit: Option<String>,

    pub target: Option<String>,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("GIT_SHA").map(String::from),
            target: option_env!("TARGET").map(String::from),
        }
    }

    pub fn display(&self) -> String {
        format!("clevert {}", self.version)
    }
}
