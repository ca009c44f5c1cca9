//! Shared configuration with coalesced persistence

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::coalesce::LatestOnly;
use crate::config::hierarchical_loader::{write_config, CONFIG_FILE};
use crate::config::types::HostConfig;

/// Process-wide configuration.
///
/// `update` mutates in memory and then calls `save`; saves are funnelled
/// through a latest-only runner, so a burst of updates results in at most one
/// write in flight plus one pending.
pub struct ConfigStore {
    config_dir: PathBuf,
    current: RwLock<HostConfig>,
    saver: LatestOnly<HostConfig>,
}

impl ConfigStore {
    /// Must be called inside a tokio runtime
    pub fn new(config_dir: PathBuf, config: HostConfig) -> Self {
        let path = config_dir.join(CONFIG_FILE);
        let saver = LatestOnly::spawn(move |config: HostConfig| {
            let path = path.clone();
            async move {
                let target = path.clone();
                let result =
                    tokio::task::spawn_blocking(move || write_config(&target, &config)).await;
                match result {
                    Ok(Ok(())) => debug!("Saved config to {}", path.display()),
                    Ok(Err(e)) => warn!("Failed to save config to {}: {}", path.display(), e),
                    Err(e) => warn!("Config save task failed: {}", e),
                }
            }
        });

        Self {
            config_dir,
            current: RwLock::new(config),
            saver,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Snapshot of the current configuration
    pub fn get(&self) -> HostConfig {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Mutate the configuration, then persist it
    pub fn update(&self, mutate: impl FnOnce(&mut HostConfig)) {
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            mutate(&mut current);
        }
        self.save();
    }

    /// Queue a write of the current configuration
    pub fn save(&self) {
        self.saver.submit(self.get());
    }

    /// Wait for queued writes to land
    pub async fn flush(&self) {
        self.saver.flush().await;
    }

    pub fn extensions_dir(&self) -> PathBuf {
        self.get().extensions_dir(&self.config_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.get().cache_dir(&self.config_dir)
    }
}
