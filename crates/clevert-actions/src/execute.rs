//! The execute capability
//!
//! An action turns `(profile, entry)` into a running execution. The
//! scheduler only sees the resulting [`ExecuteController`]: a fractional
//! progress reading, a stop switch and a future to await.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clevert_core::types::Entry;
use clevert_core::{Error, Result};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Something that can process one entry with a profile
pub trait Action: Send + Sync {
    fn execute(&self, profile: &Value, entry: &Entry) -> Result<ExecuteController>;
}

/// Cloneable handle to an execution's progress and stop switch
#[derive(Debug, Clone, Default)]
pub struct ExecuteProbe {
    /// `f64` bits
    progress: Arc<AtomicU64>,
    stop: CancellationToken,
}

impl ExecuteProbe {
    /// Fraction done, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    pub fn set_progress(&self, value: f64) {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.progress.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Resolves once `stop` has been called
    pub async fn stopped(&self) {
        self.stop.cancelled().await
    }
}

/// A running execution
#[derive(Debug)]
pub struct ExecuteController {
    probe: ExecuteProbe,
    task: JoinHandle<Result<()>>,
}

impl ExecuteController {
    /// Run `body` on a new task; it reports progress and watches for stop through the probe
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(ExecuteProbe) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let probe = ExecuteProbe::default();
        let task = tokio::spawn(body(probe.clone()));
        Self { probe, task }
    }

    pub fn progress(&self) -> f64 {
        self.probe.progress()
    }

    pub fn stop(&self) {
        self.probe.stop();
    }

    pub fn probe(&self) -> ExecuteProbe {
        self.probe.clone()
    }

    /// Wait for the execution to finish
    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(Error::execution(format!("execute task failed: {}", e))),
        }
    }
}
