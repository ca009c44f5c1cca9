//! Per-observer status stream
//!
//! Every observer gets its own loop: each tick it emits a progress event for
//! every job that has not yet reached a terminal state *for this observer*.
//! The first time the loop sees a job it spawns one listener that waits for
//! the job's completion and emits exactly one success or error event.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use clevert_actions::{RunJob, RunProgress, RunTiming};
use clevert_core::{Completion, Outcome};
use clevert_extensions::{InstallJob, InstallProgress};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::jobs::JobRegistry;

/// Events queued per observer before the loop waits on the client
const OBSERVER_BUFFER: usize = 256;

/// One message on the status stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StatusEvent {
    RunActionProgress {
        id: String,
        title: String,
        timing: RunTiming,
        progress: RunProgress,
    },
    RunActionSuccess {
        id: String,
    },
    RunActionError {
        id: String,
        error: String,
    },
    InstallExtensionProgress {
        id: String,
        title: String,
        progress: InstallProgress,
    },
    InstallExtensionSuccess {
        id: String,
    },
    InstallExtensionError {
        id: String,
        error: String,
    },
}

impl StatusEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::RunActionProgress { id, .. }
            | Self::RunActionSuccess { id }
            | Self::RunActionError { id, .. }
            | Self::InstallExtensionProgress { id, .. }
            | Self::InstallExtensionSuccess { id }
            | Self::InstallExtensionError { id, .. } => id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::RunActionProgress { .. } | Self::InstallExtensionProgress { .. }
        )
    }

    fn run_progress(job: &RunJob) -> Self {
        Self::RunActionProgress {
            id: job.id.clone(),
            title: job.title.clone(),
            timing: job.timing(),
            progress: job.progress(),
        }
    }

    fn install_progress(job: &InstallJob) -> Self {
        Self::InstallExtensionProgress {
            id: job.id.clone(),
            title: job.title.clone(),
            progress: job.progress(),
        }
    }

    fn terminal(key: &JobKey, outcome: Outcome) -> Self {
        match (key, outcome) {
            (JobKey::Run(id), Ok(())) => Self::RunActionSuccess { id: id.clone() },
            (JobKey::Run(id), Err(error)) => Self::RunActionError {
                id: id.clone(),
                error,
            },
            (JobKey::Install(id), Ok(())) => Self::InstallExtensionSuccess { id: id.clone() },
            (JobKey::Install(id), Err(error)) => Self::InstallExtensionError {
                id: id.clone(),
                error,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JobKey {
    Run(String),
    Install(String),
}

/// Jobs that reached a terminal state for one observer.
///
/// Listeners hold the lock while sending their terminal event and the loop
/// holds it while checking and sending progress, so no progress event for a
/// job can follow its terminal event.
type TerminalSet = Arc<Mutex<HashSet<JobKey>>>;

/// Start observing `registry`; the stream ends when the receiver is dropped
pub fn observe(registry: Arc<JobRegistry>, interval: Duration) -> mpsc::Receiver<StatusEvent> {
    let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);
    tokio::spawn(observer_loop(registry, interval, tx));
    rx
}

async fn observer_loop(
    registry: Arc<JobRegistry>,
    interval: Duration,
    tx: mpsc::Sender<StatusEvent>,
) {
    let terminal: TerminalSet = Arc::default();
    let mut listening: HashSet<JobKey> = HashSet::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!("Status observer connected");
    'observe: loop {
        tokio::select! {
            _ = tx.closed() => break 'observe,
            _ = ticker.tick() => {}
        }

        for job in registry.runs() {
            let key = JobKey::Run(job.id.clone());
            if listening.insert(key.clone()) {
                listen(key.clone(), job.completion().clone(), &tx, &terminal);
            }
            let done = terminal.lock().await;
            if !done.contains(&key) && tx.send(StatusEvent::run_progress(&job)).await.is_err() {
                break 'observe;
            }
        }

        for job in registry.installs() {
            let key = JobKey::Install(job.id.clone());
            if listening.insert(key.clone()) {
                listen(key.clone(), job.completion().clone(), &tx, &terminal);
            }
            let done = terminal.lock().await;
            if !done.contains(&key)
                && tx
                    .send(StatusEvent::install_progress(&job))
                    .await
                    .is_err()
            {
                break 'observe;
            }
        }
    }
    debug!("Status observer disconnected");
}

fn listen(
    key: JobKey,
    completion: Completion,
    tx: &mpsc::Sender<StatusEvent>,
    terminal: &TerminalSet,
) {
    let tx = tx.clone();
    let terminal = terminal.clone();
    tokio::spawn(async move {
        let outcome = tokio::select! {
            outcome = completion.wait() => outcome,
            _ = tx.closed() => return,
        };
        let mut done = terminal.lock().await;
        if done.insert(key.clone()) {
            // The observer may already be gone
            let _ = tx.send(StatusEvent::terminal(&key, outcome)).await;
        }
    });
}
