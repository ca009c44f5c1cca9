//! Extension install pipeline
//!
//! ```text
//! FetchManifest -> WriteManifest -> { FetchAsset -> WriteAsset -> [ExtractAsset] -> ApplyPermissions }* -> Installed
//! ```
//!
//! Any stage may fail, which is absorbing: every staging file and the target
//! extension directory tracked so far are removed before the error reaches the
//! job's completion. The target directory stays claimed in the shared
//! [`ExtensionStore`] until the attempt has finished or been rolled back, so
//! readers only ever see complete installs and a second install of the same
//! version fails instead of sharing the directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clevert_archive::ZipArchive;
use clevert_core::completion::{completion, Completion};
use clevert_core::types::{AssetKind, ExtensionManifest, Platform, MANIFEST_FILE};
use clevert_core::{Error, IdGenerator, Result};
use serde::Serialize;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use walkdir::WalkDir;

use crate::store::{ExtensionStore, InstallClaim};
use crate::transfer::{Transfer, TransferUpdate};

/// Byte counters of an install's downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub finished: u64,
    pub amount: u64,
}

/// `install-extension-progress` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstallProgress {
    pub download: DownloadProgress,
}

/// A running or settled install
#[derive(Debug)]
pub struct InstallJob {
    pub id: String,
    pub title: String,
    pub url: String,
    finished: AtomicU64,
    amount: AtomicU64,
    cancel: CancellationToken,
    completion: Completion,
}

impl InstallJob {
    pub fn progress(&self) -> InstallProgress {
        InstallProgress {
            download: DownloadProgress {
                finished: self.finished.load(Ordering::Relaxed),
                amount: self.amount.load(Ordering::Relaxed),
            },
        }
    }

    /// Abort the pipeline; it fails with `Cancelled` after rolling back
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    fn record(&self, update: TransferUpdate) {
        match update {
            TransferUpdate::Length(n) => {
                self.amount.fetch_add(n, Ordering::Relaxed);
            }
            TransferUpdate::Chunk(n) => {
                self.finished.fetch_add(n as u64, Ordering::Relaxed);
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Paths created during one install attempt
#[derive(Debug, Default)]
struct Rollback {
    staging: Vec<PathBuf>,
    target: Option<PathBuf>,
    claim: Option<InstallClaim>,
}

impl Rollback {
    fn track_staging(&mut self, path: &Path) {
        self.staging.push(path.to_path_buf());
    }

    /// Track the extension directory; `claim` is released when the rollback drops
    fn track_target(&mut self, path: &Path, claim: InstallClaim) {
        self.target = Some(path.to_path_buf());
        self.claim = Some(claim);
    }

    /// Remove leftover staging files
    async fn discard_staging(&mut self) {
        for path in self.staging.drain(..) {
            remove_path(&path).await;
        }
    }

    /// Remove everything this attempt created
    async fn undo(&mut self) {
        self.discard_staging().await;
        if let Some(target) = self.target.take() {
            remove_path(&target).await;
        }
    }
}

/// Best-effort removal of a file or directory
async fn remove_path(path: &Path) {
    let result = match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(_) => return,
    };
    if let Err(e) = result {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// Installs extensions from manifest URLs
#[derive(Debug, Clone)]
pub struct Installer {
    root: PathBuf,
    store: ExtensionStore,
    cache: PathBuf,
    platform: Platform,
    transfer: Transfer,
    ids: Arc<IdGenerator>,
}

impl Installer {
    pub fn new(
        root: PathBuf,
        cache: PathBuf,
        platform: Platform,
        transfer: Transfer,
        ids: Arc<IdGenerator>,
    ) -> Self {
        Self {
            store: ExtensionStore::new(root.clone()),
            root,
            cache,
            platform,
            transfer,
            ids,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store over the same root that hides this installer's in-flight directories
    pub fn store(&self) -> ExtensionStore {
        self.store.clone()
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Start installing the extension whose manifest lives at `url`.
    ///
    /// Returns immediately; the outcome arrives on the job's completion.
    pub fn install(&self, id: String, title: String, url: String) -> Arc<InstallJob> {
        let (done, completion) = completion();
        let job = Arc::new(InstallJob {
            id,
            title,
            url,
            finished: AtomicU64::new(0),
            amount: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            completion,
        });

        let installer = self.clone();
        let task_job = job.clone();
        let span = info_span!("install", id = %job.id);
        tokio::spawn(
            async move {
                match installer.run(&task_job).await {
                    Ok(dir) => {
                        info!("Installed {}", dir.display());
                        done.succeed();
                    }
                    Err(e) => {
                        error!("Install from {} failed: {}", task_job.url, e);
                        done.fail(e);
                    }
                }
            }
            .instrument(span),
        );

        job
    }

    /// Run the pipeline, rolling back on failure
    async fn run(&self, job: &InstallJob) -> Result<PathBuf> {
        let mut rollback = Rollback::default();
        let result = self.pipeline(job, &mut rollback).await;
        match result {
            Ok(dir) => {
                rollback.discard_staging().await;
                Ok(dir)
            }
            Err(e) => {
                debug!("Rolling back install {}", job.id);
                rollback.undo().await;
                Err(e)
            }
        }
    }

    async fn pipeline(&self, job: &InstallJob, rollback: &mut Rollback) -> Result<PathBuf> {
        fs::create_dir_all(&self.cache).await?;
        fs::create_dir_all(&self.root).await?;

        // FetchManifest
        let manifest_stage = self.staging_path("json");
        rollback.track_staging(&manifest_stage);
        self.fetch(job, &job.url, &manifest_stage)
            .instrument(info_span!("fetch_manifest"))
            .await?;

        // WriteManifest
        let manifest = read_manifest(&manifest_stage).await?;
        let ext_dir = self.root.join(manifest.dir_name());
        async {
            job.check_cancelled()?;
            let claim = self.store.claim(&manifest.dir_name())?;
            rollback.track_target(&ext_dir, claim);
            if fs::try_exists(&ext_dir).await? {
                info!("Replacing existing {}", manifest.dir_name());
                fs::remove_dir_all(&ext_dir).await?;
            }
            fs::create_dir_all(&ext_dir).await?;
            move_file(&manifest_stage, &ext_dir.join(MANIFEST_FILE)).await
        }
        .instrument(info_span!("write_manifest", extension = %manifest.dir_name()))
        .await?;

        let assets: Vec<_> = manifest.assets_for(self.platform).cloned().collect();
        info!(
            "Installing {} with {} asset(s) for {}",
            manifest.dir_name(),
            assets.len(),
            self.platform
        );

        for (index, asset) in assets.iter().enumerate() {
            let span = info_span!("asset", index, kind = asset.kind.as_str(), path = %asset.path);
            async {
                if !matches!(asset.kind, AssetKind::Raw | AssetKind::Zip) {
                    return Err(Error::UnsupportedAssetKind {
                        kind: asset.kind.as_str().to_string(),
                    });
                }

                // FetchAsset
                let stage = self.staging_path(asset.kind.staging_extension());
                rollback.track_staging(&stage);
                self.fetch(job, &asset.url, &stage).await?;
                job.check_cancelled()?;

                // WriteAsset / ExtractAsset
                let target = ext_dir.join(&asset.path);
                match asset.kind {
                    AssetKind::Zip => extract_zip(&stage, &target).await?,
                    _ => {
                        if let Some(parent) = target.parent() {
                            fs::create_dir_all(parent).await?;
                        }
                        move_file(&stage, &target).await?;
                    }
                }
                job.check_cancelled()?;

                // ApplyPermissions
                apply_permissions(&ext_dir).await
            }
            .instrument(span)
            .await?;
        }

        Ok(ext_dir)
    }

    async fn fetch(&self, job: &InstallJob, url: &str, dest: &Path) -> Result<()> {
        self.transfer
            .fetch(url, dest, &job.cancel, |update| job.record(update))
            .await?;
        Ok(())
    }

    fn staging_path(&self, extension: &str) -> PathBuf {
        self.cache
            .join(format!("{}.{}", self.ids.next_id(), extension))
    }
}

async fn read_manifest(path: &Path) -> Result<ExtensionManifest> {
    let bytes = fs::read(path).await?;
    let manifest: ExtensionManifest = serde_json::from_slice(&bytes)
        .map_err(|e| Error::invalid_manifest(format!("failed to parse manifest: {}", e)))?;
    manifest.validate()?;
    Ok(manifest)
}

/// Rename, falling back to copy + delete across filesystems
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    fs::copy(from, to).await?;
    fs::remove_file(from).await?;
    Ok(())
}

async fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let archive_path = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let count = tokio::task::spawn_blocking(move || -> Result<usize> {
        let archive = ZipArchive::open(&archive_path)?;
        Ok(archive.extract(None, &dest)?)
    })
    .await
    .map_err(|e| Error::execution(format!("extraction task failed: {}", e)))??;

    debug!("Extracted {} entries from {}", count, archive.display());
    fs::remove_file(archive).await?;
    Ok(())
}

/// Give every file (not directory) under `dir` mode 0755; no-op off unix
async fn apply_permissions(dir: &Path) -> Result<()> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        for entry in WalkDir::new(&dir) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if entry.file_type().is_file() {
                set_executable(entry.path())?;
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::execution(format!("permission task failed: {}", e)))?
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
