//! CLI command implementations

pub mod config;
pub mod extension;
pub mod serve;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};
use clevert_core::{HierarchicalConfigLoader, HostConfig};

/// Loader for `--config-dir`, or `~/.clevert`
pub fn loader(config_dir: Option<&Path>) -> Result<HierarchicalConfigLoader> {
    match config_dir {
        Some(dir) => Ok(HierarchicalConfigLoader::with_dir(dir.to_path_buf())),
        None => HierarchicalConfigLoader::new().context("Failed to locate config directory"),
    }
}

/// Effective configuration: defaults, `config.yaml`, then `CLEVERT_*` overrides
pub fn load_config(config_dir: Option<&Path>) -> Result<(HierarchicalConfigLoader, HostConfig)> {
    let loader = loader(config_dir)?;
    let config = loader.load().with_context(|| {
        format!(
            "Failed to load configuration from {}",
            loader.config_path().display()
        )
    })?;
    Ok((loader, config))
}
