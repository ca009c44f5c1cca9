//! Common test infrastructure for clevert-extensions tests
//!
//! - manifest builders producing `manifest.json` values
//! - zip fixtures written with the `zip` crate
//! - wiremock helpers serving manifests and assets
//! - an installer wired to a temporary root and cache

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clevert_core::config::NetworkConfig;
use clevert_core::types::Platform;
use clevert_core::IdGenerator;
use clevert_extensions::{Installer, Transfer};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EXT_ID: &str = "imgconv";
pub const EXT_VERSION: &str = "1.2.0";
pub const PLATFORM: Platform = Platform::LinuxX64;

/// Fluent builder for manifest JSON
pub struct ManifestBuilder {
    value: Value,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            value: json!({
                "schemaVersion": 1,
                "id": EXT_ID,
                "version": EXT_VERSION,
                "name": "Image Converter",
                "description": "Converts images",
                "dependencies": [],
                "assets": [],
                "actions": [
                    {"id": "convert", "name": "Convert", "kind": "common-files",
                     "command": {"program": "bin/convert"}}
                ],
                "profiles": [
                    {"id": "default", "name": "Default", "actionId": "convert",
                     "extensionId": EXT_ID, "extensionVersion": EXT_VERSION, "quality": 90}
                ]
            }),
        }
    }

    pub fn asset(mut self, kind: &str, url: String, path: &str) -> Self {
        self.push_asset(json!({
            "platforms": [PLATFORM.as_str()],
            "kind": kind,
            "url": url,
            "path": path,
        }));
        self
    }

    pub fn foreign_asset(mut self, url: String, path: &str) -> Self {
        self.push_asset(json!({
            "platforms": ["win-arm64"],
            "kind": "raw",
            "url": url,
            "path": path,
        }));
        self
    }

    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.value[key] = value;
        self
    }

    fn push_asset(&mut self, asset: Value) {
        if let Some(assets) = self.value["assets"].as_array_mut() {
            assets.push(asset);
        }
    }

    pub fn build(self) -> Value {
        self.value
    }
}

/// Zip archive bytes built with the `zip` crate
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in files {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Serve `body` at `route`
pub async fn mount_bytes(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Serve `body` at `route` after a delay
pub async fn mount_slow(server: &MockServer, route: &str, body: Vec<u8>, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body).set_delay(delay))
        .mount(server)
        .await;
}

/// Answer `route` with an error status
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Serve a manifest at `/manifest.json` and return its URL
pub async fn mount_manifest(server: &MockServer, manifest: &Value) -> String {
    mount_bytes(server, "/manifest.json", serde_json::to_vec(manifest).unwrap()).await;
    format!("{}/manifest.json", server.uri())
}

/// Installer over a temporary extensions root and cache
pub struct TestEnv {
    pub temp: TempDir,
    pub root: PathBuf,
    pub cache: PathBuf,
    pub installer: Installer,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("extensions");
        let cache = temp.path().join("cache");
        let installer = Installer::new(
            root.clone(),
            cache.clone(),
            PLATFORM,
            Transfer::new(&NetworkConfig::default()).unwrap(),
            Arc::new(IdGenerator::new()),
        );
        Self {
            temp,
            root,
            cache,
            installer,
        }
    }

    pub fn ext_dir(&self) -> PathBuf {
        self.root.join(format!("{}_{}", EXT_ID, EXT_VERSION))
    }
}

/// Recursively list files (relative, `/`-separated) under `root`
pub fn list_files(root: &Path) -> Vec<String> {
    if !root.exists() {
        return Vec::new();
    }
    let mut out: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    out.sort();
    out
}
