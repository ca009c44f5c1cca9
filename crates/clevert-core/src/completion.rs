//! One-shot job completion that any number of observers can await

use std::fmt::Display;

use tokio::sync::watch;

/// Final state of a job: success, or the error message
pub type Outcome = std::result::Result<(), String>;

/// Message reported when a job's sender goes away without settling it
const ABANDONED: &str = "job ended without reporting a result";

/// Write side of a completion; the first settle wins
#[derive(Debug)]
pub struct CompletionSender {
    tx: watch::Sender<Option<Outcome>>,
}

/// Read side of a completion; cheap to clone
#[derive(Debug, Clone)]
pub struct Completion {
    rx: watch::Receiver<Option<Outcome>>,
}

/// Create a connected sender/receiver pair
pub fn completion() -> (CompletionSender, Completion) {
    let (tx, rx) = watch::channel(None);
    (CompletionSender { tx }, Completion { rx })
}

impl CompletionSender {
    /// Settle the completion. Returns false when it was already settled.
    pub fn complete(&self, outcome: Outcome) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    pub fn succeed(&self) -> bool {
        self.complete(Ok(()))
    }

    pub fn fail(&self, error: impl Display) -> bool {
        self.complete(Err(error.to_string()))
    }
}

impl Completion {
    /// A completion that has already failed
    pub fn failed(error: impl Display) -> Self {
        let (tx, rx) = completion();
        tx.fail(error);
        rx
    }

    /// Current outcome without waiting
    pub fn peek(&self) -> Option<Outcome> {
        self.rx.borrow().clone()
    }

    /// Wait for the outcome
    pub async fn wait(&self) -> Outcome {
        let mut rx = self.rx.clone();
        if let Ok(slot) = rx.wait_for(|slot| slot.is_some()).await {
            if let Some(outcome) = slot.clone() {
                return outcome;
            }
        }
        let outcome = rx.borrow().clone();
        outcome.unwrap_or_else(|| Err(ABANDONED.to_string()))
    }
}
