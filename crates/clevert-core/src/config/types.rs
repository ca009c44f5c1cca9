//! Host configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::Platform;

/// Complete host configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostConfig {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Status stream
    #[serde(default)]
    pub status: StatusConfig,

    /// Action scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Outbound HTTP
    #[serde(default)]
    pub network: NetworkConfig,

    /// Platform override for asset selection; detected when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl HostConfig {
    /// Directory holding installed extensions
    pub fn extensions_dir(&self, config_dir: &Path) -> PathBuf {
        resolve(config_dir, self.paths.extensions.as_deref(), "extensions")
    }

    /// Directory holding staging files for downloads
    pub fn cache_dir(&self, config_dir: &Path) -> PathBuf {
        resolve(config_dir, self.paths.cache.as_deref(), "cache")
    }
}

fn resolve(config_dir: &Path, configured: Option<&Path>, default: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => config_dir.join(path),
        None => config_dir.join(default),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Preferred port; the last successfully bound port is written back here
    #[serde(default = "default_port")]
    pub port: u16,

    /// How many consecutive ports to try when the preferred one is taken
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            port_attempts: default_port_attempts(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathsConfig {
    /// Relative paths are resolved against the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatusConfig {
    /// Progress tick per observer
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Pause between starting an execute and awaiting it
    #[serde(default = "default_start_pause_ms")]
    pub start_pause_ms: u64,

    /// Worker count when a request does not give one
    #[serde(default = "default_parallel")]
    pub default_parallel: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            start_pause_ms: default_start_pause_ms(),
            default_parallel: default_parallel(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9393
}

fn default_port_attempts() -> u16 {
    20
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_start_pause_ms() -> u64 {
    100
}

fn default_parallel() -> usize {
    1
}

fn default_user_agent() -> String {
    format!("clevert/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout() -> u64 {
    30
}
