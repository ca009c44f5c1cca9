//! Shared application state

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clevert_actions::{Action, CommandAction, Scheduler};
use clevert_core::types::{Action as ActionDecl, ExtensionManifest, Platform};
use clevert_core::{ConfigStore, IdGenerator, Result};
use clevert_extensions::{ExtensionStore, Installer, Transfer};
use tracing::info;

use crate::jobs::JobRegistry;

/// Turns a manifest action into something the scheduler can run
pub trait ActionResolver: Send + Sync {
    fn resolve(
        &self,
        ext_dir: &Path,
        manifest: &ExtensionManifest,
        action: &ActionDecl,
    ) -> Result<Arc<dyn Action>>;
}

/// Runs actions as subprocesses declared by the manifest's `command`
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandResolver;

impl ActionResolver for CommandResolver {
    fn resolve(
        &self,
        ext_dir: &Path,
        _manifest: &ExtensionManifest,
        action: &ActionDecl,
    ) -> Result<Arc<dyn Action>> {
        Ok(Arc::new(CommandAction::from_manifest(ext_dir, action)?))
    }
}

/// Everything the HTTP handlers share
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub jobs: Arc<JobRegistry>,
    pub ids: Arc<IdGenerator>,
    pub store: ExtensionStore,
    pub installer: Installer,
    pub scheduler: Scheduler,
    pub resolver: Arc<dyn ActionResolver>,
}

impl AppState {
    pub fn new(config: Arc<ConfigStore>) -> Result<Self> {
        Self::with_resolver(config, Arc::new(CommandResolver))
    }

    pub fn with_resolver(
        config: Arc<ConfigStore>,
        resolver: Arc<dyn ActionResolver>,
    ) -> Result<Self> {
        let settings = config.get();
        let platform = match settings.platform {
            Some(platform) => platform,
            None => Platform::current()?,
        };
        let extensions_dir = config.extensions_dir();
        let cache_dir = config.cache_dir();
        info!(
            "Extensions in {}, platform {}",
            extensions_dir.display(),
            platform
        );

        let ids = Arc::new(IdGenerator::new());
        let transfer = Transfer::new(&settings.network)?;
        let installer = Installer::new(
            extensions_dir,
            cache_dir,
            platform,
            transfer,
            ids.clone(),
        );

        Ok(Self {
            jobs: Arc::new(JobRegistry::new()),
            ids,
            store: installer.store(),
            installer,
            scheduler: Scheduler::new(Duration::from_millis(settings.scheduler.start_pause_ms)),
            resolver,
            config,
        })
    }

    /// Tick between progress events on the status stream
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.config.get().status.interval_ms.max(1))
    }
}
