//! Shared utility functions for Clevert crates

use anyhow::anyhow;
use std::path::PathBuf;

/// Get the user's home directory
///
/// `HOME` wins over `dirs::home_dir()` so tests and wrappers can relocate it.
pub fn get_home_dir() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))
}

/// Whether `value` is usable as a single path component (no separators, no `..`)
pub fn is_plain_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains('/')
        && !value.contains('\\')
        && !value.contains('\0')
}
