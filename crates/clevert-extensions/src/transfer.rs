//! Streaming HTTP downloads
//!
//! The response body is written chunk by chunk; each write is awaited before
//! the next chunk is read, so a slow disk throttles the network read.
//! Nothing is retried and partial files are left for the caller to clean up.

use std::path::Path;
use std::time::Duration;

use clevert_core::config::NetworkConfig;
use clevert_core::{Error, Result};
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Maximum redirects followed per request
const MAX_REDIRECTS: usize = 10;

/// Progress notification from a running transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferUpdate {
    /// Content length, reported once before the first chunk (0 when unknown)
    Length(u64),
    /// Bytes written by the latest chunk
    Chunk(usize),
}

/// Result of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub bytes: u64,
    pub content_length: Option<u64>,
}

/// HTTP downloader shared by install pipelines
#[derive(Debug, Clone)]
pub struct Transfer {
    client: reqwest::Client,
}

impl Transfer {
    /// Build a downloader from the network settings
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&network.user_agent)
            .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| Error::transfer("", format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Download `url` into `dest`, reporting progress through `on_progress`
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(TransferUpdate),
    ) -> Result<TransferSummary> {
        debug!("Downloading {} to {}", url, dest.display());

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.get(url).send() => {
                response.map_err(|e| Error::transfer(url, e.to_string()))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_length = response.content_length();
        on_progress(TransferUpdate::Length(content_length.unwrap_or(0)));

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| Error::transfer(url, e.to_string()))?;

            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
            on_progress(TransferUpdate::Chunk(chunk.len()));
        }

        file.flush().await?;
        debug!("Downloaded {} bytes from {}", bytes, url);

        Ok(TransferSummary {
            bytes,
            content_length,
        })
    }
}
