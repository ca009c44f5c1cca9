//! End-to-end tests over a real listener
//!
//! Tests cover:
//! - Port fallback and persisting the bound port
//! - Installing an extension and running one of its actions, observed
//!   through the SSE status stream

mod common;

use std::time::Duration;

use clevert_core::HierarchicalConfigLoader;
use clevert_host::{bind, serve};
use common::*;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(20);

/// Reads `data:` payloads off an SSE response
struct SseReader {
    stream: std::pin::Pin<Box<dyn futures_util::Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
    buffer: String,
}

impl SseReader {
    fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream()),
            buffer: String::new(),
        }
    }

    async fn next_event(&mut self) -> Value {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                let data: String = block
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(str::trim_start)
                    .collect();
                if !data.is_empty() {
                    return serde_json::from_str(&data).unwrap();
                }
                continue;
            }
            let chunk = self.stream.next().await.expect("stream ended").unwrap();
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    /// Skip progress events until the terminal event for `id`
    async fn terminal_for(&mut self, id: &str) -> Value {
        tokio::time::timeout(WAIT, async {
            loop {
                let event = self.next_event().await;
                let kind = event["kind"].as_str().unwrap_or_default().to_string();
                if event["id"] == id && !kind.ends_with("-progress") {
                    return event;
                }
            }
        })
        .await
        .expect("no terminal event")
    }
}

#[tokio::test]
async fn test_bind_walks_to_next_free_port_and_persists_it() {
    let host = TestHost::new();
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken_port = taken.local_addr().unwrap().port();
    host.state.config.update(|c| {
        c.server.port = taken_port;
        c.server.port_attempts = 10;
    });

    let listener = bind(&host.state.config).await.unwrap();
    let bound = listener.local_addr().unwrap().port();
    assert_ne!(bound, taken_port);
    assert!(bound > taken_port && bound < taken_port + 10);

    host.state.config.flush().await;
    let saved = HierarchicalConfigLoader::with_dir(host.temp.path().to_path_buf())
        .load()
        .unwrap();
    assert_eq!(saved.server.port, bound);
}

#[tokio::test]
async fn test_bind_gives_up_after_attempts() {
    let host = TestHost::new();
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken_port = taken.local_addr().unwrap().port();
    host.state.config.update(|c| {
        c.server.port = taken_port;
        c.server.port_attempts = 1;
    });
    assert!(bind(&host.state.config).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_install_then_run_over_sse() {
    let host = TestHost::new();

    // Extension served by a mock registry
    let registry = MockServer::start().await;
    let mut manifest = manifest_json();
    manifest["assets"] = json!([{
        "platforms": ["linux-x64"],
        "kind": "raw",
        "url": format!("{}/index.js", registry.uri()),
        "path": "index.js"
    }]);
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&manifest))
        .mount(&registry)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("export default {};\n"))
        .mount(&registry)
        .await;

    let listener = bind(&host.state.config).await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(serve(listener, host.state.clone()));

    let client = reqwest::Client::new();
    let status = client
        .get(format!("{}/get-status", base))
        .send()
        .await
        .unwrap();
    assert_eq!(
        status.headers()["content-type"],
        "text/event-stream"
    );
    let mut events = SseReader::new(status);

    // Install
    let created: Value = client
        .post(format!("{}/install-extension", base))
        .json(&json!({"title": "Image Converter", "url": format!("{}/manifest.json", registry.uri())}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let install_id = created["id"].as_str().unwrap().to_string();
    let terminal = events.terminal_for(&install_id).await;
    assert_eq!(
        terminal,
        json!({"kind": "install-extension-success", "id": install_id})
    );

    let listed: Value = client
        .get(format!("{}/list-extensions", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed[0]["id"], EXT_ID);

    let module = client
        .get(format!("{}/extensions/{}_{}/index.js", base, EXT_ID, EXT_VERSION))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(module, "export default {};\n");

    // Run
    let created: Value = client
        .post(format!("{}/run-action", base))
        .json(&host.run_request(4, 2))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let run_id = created["id"].as_str().unwrap().to_string();
    let terminal = events.terminal_for(&run_id).await;
    assert_eq!(terminal, json!({"kind": "run-action-success", "id": run_id}));
}
