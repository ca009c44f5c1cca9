//! Extension manifest types
//!
//! An extension is described by `manifest.json` at the root of its
//! directory. The manifest is data only: actions are run through the
//! declared `command`, never loaded into the host.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::platform::Platform;
use crate::error::{Error, Result};
use crate::utils::is_plain_component;

/// Manifest schema version this host understands
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Manifest file name inside an extension directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Extension manifest (`manifest.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionManifest {
    pub schema_version: u32,
    pub id: String,
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,

    /// Declared, not enforced
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub assets: Vec<Asset>,

    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl ExtensionManifest {
    /// Directory name of this extension version: `<id>_<version>`
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.id, self.version)
    }

    pub fn action(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Assets applicable to `platform`, in manifest order
    pub fn assets_for(&self, platform: Platform) -> impl Iterator<Item = &Asset> {
        self.assets
            .iter()
            .filter(move |a| a.platforms.contains(&platform))
    }

    /// Check the manifest before anything is written to the extension root
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != MANIFEST_SCHEMA_VERSION {
            return Err(Error::invalid_manifest(format!(
                "unsupported schemaVersion {} (expected {})",
                self.schema_version, MANIFEST_SCHEMA_VERSION
            )));
        }
        if !is_plain_component(&self.id) {
            return Err(Error::invalid_manifest(format!("invalid id {:?}", self.id)));
        }
        if !is_plain_component(&self.version) {
            return Err(Error::invalid_manifest(format!(
                "invalid version {:?}",
                self.version
            )));
        }
        for asset in &self.assets {
            if !is_contained_path(&asset.path) {
                return Err(Error::invalid_manifest(format!(
                    "asset path {:?} escapes the extension directory",
                    asset.path
                )));
            }
            if is_manifest_path(&asset.path) {
                return Err(Error::invalid_manifest(format!(
                    "asset path {:?} would replace {}",
                    asset.path, MANIFEST_FILE
                )));
            }
        }
        for action in &self.actions {
            if action.id.is_empty() {
                return Err(Error::invalid_manifest("action with empty id"));
            }
        }
        Ok(())
    }
}

/// Relative path that stays inside its base directory
fn is_contained_path(path: &str) -> bool {
    if path.is_empty() || path.contains('\\') {
        return false;
    }
    let mut normal = 0;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            _ => return false,
        }
    }
    normal > 0
}

/// `manifest.json` at the extension root, spelled any way
fn is_manifest_path(path: &str) -> bool {
    let mut normal = Path::new(path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)));
    matches!(
        (normal.next(), normal.next()),
        (Some(Component::Normal(name)), None) if name == MANIFEST_FILE
    )
}

/// How an asset is packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    Raw,
    Zip,
    Gzip,
    Xz,
    Tar,
    TarGzip,
    TarXz,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Zip => "zip",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Tar => "tar",
            Self::TarGzip => "tar-gzip",
            Self::TarXz => "tar-xz",
        }
    }

    /// Staging file extension
    pub fn staging_extension(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Zip => "zip",
            Self::Gzip => "gz",
            Self::Xz => "xz",
            Self::Tar => "tar",
            Self::TarGzip => "tar.gz",
            Self::TarXz => "tar.xz",
        }
    }
}

/// Platform-specific file delivered with an extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub platforms: Vec<Platform>,
    pub kind: AssetKind,
    pub url: String,

    /// File path for `raw`, directory for archive kinds; relative to the extension directory
    pub path: String,
}

/// How an action's entries are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntriesKind {
    CommonFiles,
    Plain,
    NumberSequence,
}

/// Subprocess invocation implementing an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCommand {
    /// Program, resolved against the extension directory when relative
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Action declared by an extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: EntriesKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<ActionCommand>,
}

/// Saved parameter set for an action; unknown fields are kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub action_id: String,
    pub extension_id: String,
    pub extension_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `list-extensions` item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSummary {
    pub id: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub actions: Vec<ActionSummary>,
    /// Full profile objects, action-defined fields included
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<&ExtensionManifest> for ExtensionSummary {
    fn from(manifest: &ExtensionManifest) -> Self {
        Self {
            id: manifest.id.clone(),
            version: manifest.version.clone(),
            name: manifest.name.clone(),
            description: manifest.description.clone(),
            actions: manifest
                .actions
                .iter()
                .map(|a| ActionSummary {
                    id: a.id.clone(),
                    name: a.name.clone(),
                    description: a.description.clone(),
                })
                .collect(),
            profiles: manifest.profiles.clone(),
        }
    }
}
