//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Config file (~/.clevert/config.yaml)
//! 3. Environment variables (CLEVERT_* prefix)
//! 4. CLI flags (handled by caller)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::types::HostConfig;
use crate::error::{Error, Result};
use crate::utils::get_home_dir;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a loader for the standard config directory (~/.clevert)
    pub fn new() -> Result<Self> {
        let home = get_home_dir().map_err(|e| Error::invalid_config(e.to_string()))?;
        Ok(Self::with_dir(home.join(".clevert")))
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Load host configuration with hierarchical precedence
    pub fn load(&self) -> Result<HostConfig> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)?;
        }

        let path = self.config_path();
        let config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                HostConfig::default()
            } else {
                serde_yaml_ng::from_str(&content).map_err(|e| {
                    Error::invalid_config(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
        } else {
            HostConfig::default()
        };

        Self::apply_env_overrides(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: HostConfig) -> Result<HostConfig> {
        if let Ok(val) = env::var("CLEVERT_HOST") {
            config.server.host = val;
        }

        if let Ok(val) = env::var("CLEVERT_PORT") {
            config.server.port = val
                .parse()
                .map_err(|_| Error::invalid_config("CLEVERT_PORT must be a valid port number"))?;
        }

        if let Ok(val) = env::var("CLEVERT_EXTENSIONS_DIR") {
            config.paths.extensions = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("CLEVERT_CACHE_DIR") {
            config.paths.cache = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("CLEVERT_STATUS_INTERVAL_MS") {
            config.status.interval_ms = val.parse().map_err(|_| {
                Error::invalid_config("CLEVERT_STATUS_INTERVAL_MS must be a valid number")
            })?;
        }

        Ok(config)
    }
}

/// Write `config` to `path` atomically (temp file + rename)
pub(crate) fn write_config(path: &Path, config: &HostConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml_ng::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, yaml)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
