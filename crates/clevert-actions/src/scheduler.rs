//! Worker-pool scheduler for run-action jobs
//!
//! Entries sit in one FIFO queue shared by `parallel` workers. Each worker
//! pops an entry, starts the action's execute, registers the controller so
//! progress can be sampled, pauses briefly, then waits for it. The job
//! fails as soon as any execute fails; workers still running at that point
//! are left to drain the queue in the background.

use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use clevert_core::completion::completion;
use clevert_core::types::Entry;
use clevert_core::{Completion, Error, Result};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::execute::{Action, ExecuteProbe};

/// Default pause between starting an execute and awaiting it
pub const DEFAULT_START_PAUSE: Duration = Duration::from_millis(100);

/// Aggregate progress of a run job
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunProgress {
    /// Entries completed
    pub finished: usize,
    /// Sum of the in-flight executes' progress fractions
    pub running: f64,
    /// Entries in total
    pub amount: usize,
}

/// Start time and projected end time, in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTiming {
    pub begin: f64,
    pub expected_end: f64,
}

/// One run-action job
#[derive(Debug)]
pub struct RunJob {
    pub id: String,
    pub title: String,
    begin: f64,
    amount: usize,
    workers: usize,
    finished: AtomicUsize,
    queue: Mutex<VecDeque<Entry>>,
    running: Mutex<HashMap<u64, ExecuteProbe>>,
    next_slot: AtomicU64,
    completion: Completion,
}

impl RunJob {
    fn new(
        id: String,
        title: String,
        entries: Vec<Entry>,
        workers: usize,
        completion: Completion,
    ) -> Self {
        Self {
            id,
            title,
            begin: unix_now(),
            amount: entries.len(),
            workers,
            finished: AtomicUsize::new(0),
            queue: Mutex::new(entries.into()),
            running: Mutex::new(HashMap::new()),
            next_slot: AtomicU64::new(0),
            completion,
        }
    }

    /// A job that failed before any work started
    pub fn failed(id: String, title: String, error: impl Display) -> Arc<Self> {
        Arc::new(Self::new(id, title, Vec::new(), 0, Completion::failed(error)))
    }

    /// Number of workers draining the queue
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn progress(&self) -> RunProgress {
        let running = lock(&self.running)
            .values()
            .map(ExecuteProbe::progress)
            .sum();
        RunProgress {
            finished: self.finished.load(Ordering::Relaxed),
            running,
            amount: self.amount,
        }
    }

    /// Linear projection from elapsed time and progress
    pub fn timing(&self) -> RunTiming {
        let progress = self.progress();
        let done = progress.finished as f64 + progress.running;
        let expected_end = if done > 0.0 && self.amount > 0 {
            let elapsed = (unix_now() - self.begin).max(0.0);
            self.begin + elapsed * self.amount as f64 / done
        } else {
            self.begin
        };
        RunTiming {
            begin: self.begin,
            expected_end,
        }
    }

    /// Stop every in-flight execute. Queued entries are not touched.
    pub fn stop(&self) {
        let probes: Vec<ExecuteProbe> = lock(&self.running).drain().map(|(_, p)| p).collect();
        info!("Stopping {} running executes of {}", probes.len(), self.id);
        for probe in probes {
            probe.stop();
        }
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    fn pop(&self) -> Option<Entry> {
        lock(&self.queue).pop_front()
    }

    fn register(&self, probe: ExecuteProbe) -> u64 {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        lock(&self.running).insert(slot, probe);
        slot
    }

    fn unregister(&self, slot: u64) {
        lock(&self.running).remove(&slot);
    }
}

/// Runs actions over entries with a bounded number of workers
#[derive(Debug, Clone)]
pub struct Scheduler {
    start_pause: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_START_PAUSE)
    }
}

impl Scheduler {
    pub fn new(start_pause: Duration) -> Self {
        Self { start_pause }
    }

    /// Start a job with `parallel` workers, clamped to `1..=entries.len()`
    pub fn run(
        &self,
        id: String,
        title: String,
        action: Arc<dyn Action>,
        profile: Value,
        entries: Vec<Entry>,
        parallel: usize,
    ) -> Arc<RunJob> {
        let parallel = parallel.clamp(1, entries.len().max(1));
        let (done, completion) = completion();
        let job = Arc::new(RunJob::new(id, title, entries, parallel, completion));
        let profile = Arc::new(profile);
        let span = info_span!("run", id = %job.id);

        info!(
            parent: &span,
            "Running {} entries with {} workers",
            job.amount,
            job.workers()
        );

        let mut workers: FuturesUnordered<_> = (0..job.workers())
            .map(|_| {
                tokio::spawn(
                    worker(
                        job.clone(),
                        action.clone(),
                        profile.clone(),
                        self.start_pause,
                    )
                    .instrument(span.clone()),
                )
            })
            .collect();

        let driver_job = job.clone();
        tokio::spawn(
            async move {
                while let Some(joined) = workers.next().await {
                    let result = joined.unwrap_or_else(|e| {
                        Err(Error::execution(format!("worker task failed: {}", e)))
                    });
                    if let Err(e) = result {
                        // Remaining workers are detached and keep draining the queue
                        warn!("Run {} failed: {}", driver_job.id, e);
                        done.fail(e);
                        return;
                    }
                }
                info!("Run {} finished", driver_job.id);
                done.succeed();
            }
            .instrument(span),
        );

        job
    }
}

async fn worker(
    job: Arc<RunJob>,
    action: Arc<dyn Action>,
    profile: Arc<Value>,
    start_pause: Duration,
) -> Result<()> {
    while let Some(entry) = job.pop() {
        let controller = action.execute(&profile, &entry)?;
        let slot = job.register(controller.probe());
        tokio::time::sleep(start_pause).await;

        let result = controller.wait().await;
        job.unregister(slot);
        result?;

        let finished = job.finished.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("{}/{} entries finished", finished, job.amount);
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
