//! Installed extensions on disk
//!
//! Layout: `<root>/<id>_<version>/manifest.json`, the optional `index.js` UI
//! module, and whatever asset paths the manifest declares.
//!
//! Directories claimed by a running install are invisible to every read
//! until the claim is released, so nothing sees a half-written extension.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use clevert_core::types::{ExtensionManifest, ExtensionSummary, MANIFEST_FILE};
use clevert_core::utils::is_plain_component;
use clevert_core::{Error, Result};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::module::strip_host_imports;

/// Browser UI module file name
pub const UI_MODULE_FILE: &str = "index.js";

/// Read access to the extensions root
#[derive(Debug, Clone)]
pub struct ExtensionStore {
    root: PathBuf,
    installing: Arc<Mutex<HashSet<String>>>,
}

/// Exclusive hold on one `<id>_<version>` directory while it is written.
/// Released on drop.
#[derive(Debug)]
pub struct InstallClaim {
    installing: Arc<Mutex<HashSet<String>>>,
    dir_name: String,
}

impl Drop for InstallClaim {
    fn drop(&mut self) {
        lock(&self.installing).remove(&self.dir_name);
    }
}

impl ExtensionStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            installing: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of an installed extension version
    pub fn extension_dir(&self, id: &str, version: &str) -> Result<PathBuf> {
        if !is_plain_component(id) || !is_plain_component(version) {
            return Err(Error::extension_not_found(id, version));
        }
        Ok(self.root.join(format!("{}_{}", id, version)))
    }

    /// Claim `dir_name` for an install; fails while another install holds it
    pub fn claim(&self, dir_name: &str) -> Result<InstallClaim> {
        if !lock(&self.installing).insert(dir_name.to_string()) {
            return Err(Error::InstallInProgress {
                extension: dir_name.to_string(),
            });
        }
        Ok(InstallClaim {
            installing: self.installing.clone(),
            dir_name: dir_name.to_string(),
        })
    }

    fn is_installing(&self, dir_name: &str) -> bool {
        lock(&self.installing).contains(dir_name)
    }

    /// Every valid installed extension, ordered by directory name
    pub async fn list(&self) -> Result<Vec<ExtensionManifest>> {
        let mut dirs = match fs::read_dir(&self.root).await {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = dirs.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.is_installing(&name) {
                debug!("Skipping {}: install in progress", name);
                continue;
            }
            match read_manifest(&entry.path()).await {
                Ok(manifest) if manifest.dir_name() == name => found.push((name, manifest)),
                Ok(manifest) => warn!(
                    "Skipping {}: manifest declares {}",
                    name,
                    manifest.dir_name()
                ),
                Err(e) => warn!("Skipping {}: {}", name, e),
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        debug!("Found {} installed extension(s)", found.len());
        Ok(found.into_iter().map(|(_, manifest)| manifest).collect())
    }

    /// `list-extensions` payload
    pub async fn summaries(&self) -> Result<Vec<ExtensionSummary>> {
        Ok(self
            .list()
            .await?
            .iter()
            .map(ExtensionSummary::from)
            .collect())
    }

    /// Manifest of one installed version
    pub async fn load(&self, id: &str, version: &str) -> Result<ExtensionManifest> {
        let dir = self.extension_dir(id, version)?;
        if self.is_installing(&format!("{}_{}", id, version)) {
            return Err(Error::extension_not_found(id, version));
        }
        match read_manifest(&dir).await {
            Ok(manifest) if manifest.id == id && manifest.version == version => Ok(manifest),
            Ok(_) => Err(Error::extension_not_found(id, version)),
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::extension_not_found(id, version))
            }
            Err(e) => Err(e),
        }
    }

    /// Delete an installed version; a missing directory is not an error
    pub async fn remove(&self, id: &str, version: &str) -> Result<()> {
        let dir = self.extension_dir(id, version)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("Removed {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} already absent", dir.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// UI module with host-only imports commented out, if the extension ships one
    pub async fn ui_module(&self, id: &str, version: &str) -> Result<Option<String>> {
        let dir = self.extension_dir(id, version)?;
        if self.is_installing(&format!("{}_{}", id, version)) {
            return Ok(None);
        }
        let path = dir.join(UI_MODULE_FILE);
        match fs::read_to_string(&path).await {
            Ok(source) => Ok(Some(strip_host_imports(&source))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|e| e.into_inner())
}

async fn read_manifest(dir: &Path) -> Result<ExtensionManifest> {
    let bytes = fs::read(dir.join(MANIFEST_FILE)).await?;
    let manifest: ExtensionManifest = serde_json::from_slice(&bytes)?;
    Ok(manifest)
}
