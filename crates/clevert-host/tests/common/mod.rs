//! Shared helpers for host tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use clevert_actions::{Action, ExecuteController};
use clevert_core::config::HostConfig;
use clevert_core::types::{Action as ActionDecl, Entry, ExtensionManifest, Platform};
use clevert_core::{ConfigStore, Result};
use clevert_host::{ActionResolver, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const EXT_ID: &str = "imgconv";
pub const EXT_VERSION: &str = "1.2.0";

/// Action that sleeps briefly per entry and always succeeds
#[derive(Debug)]
pub struct SleepAction(pub Duration);

impl Action for SleepAction {
    fn execute(&self, _profile: &Value, _entry: &Entry) -> Result<ExecuteController> {
        let delay = self.0;
        Ok(ExecuteController::spawn(move |probe| async move {
            probe.set_progress(0.5);
            tokio::time::sleep(delay).await;
            Ok(())
        }))
    }
}

/// Resolves every manifest action to the same in-process action
pub struct StaticResolver(pub Arc<dyn Action>);

impl ActionResolver for StaticResolver {
    fn resolve(
        &self,
        _ext_dir: &Path,
        _manifest: &ExtensionManifest,
        _action: &ActionDecl,
    ) -> Result<Arc<dyn Action>> {
        Ok(self.0.clone())
    }
}

/// Manifest JSON for the test extension
pub fn manifest_json() -> Value {
    json!({
        "schemaVersion": 1,
        "id": EXT_ID,
        "version": EXT_VERSION,
        "name": "Image Converter",
        "description": "Converts images",
        "actions": [{
            "id": "convert",
            "name": "Convert",
            "kind": "common-files",
            "command": {"program": "bin/convert"}
        }],
        "profiles": [{
            "id": "default",
            "name": "Default",
            "actionId": "convert",
            "extensionId": EXT_ID,
            "extensionVersion": EXT_VERSION,
            "quality": 80
        }],
        "assets": []
    })
}

/// Temporary config dir with a host state built on it
pub struct TestHost {
    pub temp: TempDir,
    pub state: AppState,
}

impl TestHost {
    /// Must be called inside a tokio runtime
    pub fn new() -> Self {
        Self::with_action(Arc::new(SleepAction(Duration::from_millis(20))))
    }

    pub fn with_action(action: Arc<dyn Action>) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = HostConfig::default();
        config.server.port = 0;
        config.status.interval_ms = 20;
        config.scheduler.start_pause_ms = 1;
        config.platform = Some(Platform::LinuxX64);

        let store = Arc::new(ConfigStore::new(temp.path().to_path_buf(), config));
        let state = AppState::with_resolver(store, Arc::new(StaticResolver(action))).unwrap();
        Self { temp, state }
    }

    pub fn extensions_dir(&self) -> PathBuf {
        self.state.config.extensions_dir()
    }

    /// Write the test extension's manifest (and optionally a UI module)
    pub fn install_fixture(&self, ui_module: Option<&str>) -> PathBuf {
        let dir = self
            .extensions_dir()
            .join(format!("{}_{}", EXT_ID, EXT_VERSION));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("manifest.json"),
            serde_json::to_vec_pretty(&manifest_json()).unwrap(),
        )
        .unwrap();
        if let Some(source) = ui_module {
            std::fs::write(dir.join("index.js"), source).unwrap();
        }
        dir
    }

    /// Input directory with `count` files
    pub fn input_dir(&self, count: usize) -> PathBuf {
        let dir = self.temp.path().join("input");
        std::fs::create_dir_all(&dir).unwrap();
        for n in 0..count {
            std::fs::write(dir.join(format!("{}.png", n)), b"png").unwrap();
        }
        dir
    }

    pub fn run_request(&self, inputs: usize, parallel: usize) -> Value {
        json!({
            "title": "Convert photos",
            "extensionId": EXT_ID,
            "extensionVersion": EXT_VERSION,
            "actionId": "convert",
            "profile": "default",
            "entries": {
                "kind": "common-files",
                "inputDir": self.input_dir(inputs).to_str().unwrap(),
                "outputDir": self.temp.path().join("output").to_str().unwrap(),
                "outputExtension": "jxl"
            },
            "parallel": parallel
        })
    }
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
