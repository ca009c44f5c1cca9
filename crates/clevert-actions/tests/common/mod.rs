//! Shared test actions for scheduler and command tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clevert_actions::{Action, ExecuteController};
use clevert_core::types::Entry;
use clevert_core::{Error, Result};
use serde_json::{json, Value};

/// Numbered plain entries `0..count`
pub fn numbered(count: usize) -> Vec<Entry> {
    (0..count).map(|n| Entry::Plain(json!(n))).collect()
}

fn number_of(entry: &Entry) -> Option<u64> {
    match entry {
        Entry::Plain(value) => value.as_u64(),
        Entry::Files { .. } => None,
    }
}

/// Records every entry it runs and the highest concurrency seen
#[derive(Debug, Default)]
pub struct RecordingAction {
    pub delay: Duration,
    pub started: Mutex<Vec<Entry>>,
    pub profiles: Mutex<Vec<Value>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl RecordingAction {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<Entry> {
        self.started.lock().unwrap().clone()
    }
}

impl Action for RecordingAction {
    fn execute(&self, profile: &Value, entry: &Entry) -> Result<ExecuteController> {
        self.started.lock().unwrap().push(entry.clone());
        self.profiles.lock().unwrap().push(profile.clone());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let active = self.active.clone();
        let delay = self.delay;
        Ok(ExecuteController::spawn(move |probe| async move {
            probe.set_progress(0.5);
            tokio::time::sleep(delay).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }))
    }
}

/// Fails the entry numbered `failing`, either at start or while running
#[derive(Debug)]
pub struct FailingAction {
    pub failing: u64,
    pub at_start: bool,
    pub delay: Duration,
    pub completed: AtomicUsize,
}

impl FailingAction {
    pub fn new(failing: u64, at_start: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            failing,
            at_start,
            delay,
            completed: AtomicUsize::new(0),
        })
    }
}

impl Action for FailingAction {
    fn execute(&self, _profile: &Value, entry: &Entry) -> Result<ExecuteController> {
        let fails = number_of(entry) == Some(self.failing);
        if fails && self.at_start {
            return Err(Error::execution(format!("cannot start entry {}", self.failing)));
        }
        let delay = self.delay;
        let failing = self.failing;
        Ok(ExecuteController::spawn(move |_| async move {
            if fails {
                return Err(Error::execution(format!("entry {} failed", failing)));
            }
            tokio::time::sleep(delay).await;
            Ok(())
        }))
    }
}

/// Runs until stopped, reporting a fixed progress
#[derive(Debug, Default)]
pub struct StoppableAction {
    pub started: AtomicUsize,
}

impl Action for StoppableAction {
    fn execute(&self, _profile: &Value, _entry: &Entry) -> Result<ExecuteController> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(ExecuteController::spawn(|probe| async move {
            probe.set_progress(0.25);
            probe.stopped().await;
            Err(Error::execution("stopped"))
        }))
    }
}
