//! Job id generation
//!
//! Ids look like `<unix seconds>_<sequence>` where the sequence is a
//! zero-padded six-digit counter that restarts every second. Within one
//! process the ids are unique and sort in creation order.

use std::sync::Mutex;

use chrono::Utc;

#[derive(Debug, Default)]
struct IdState {
    second: i64,
    sequence: u32,
}

/// Generator of unique, lexically increasing job ids
#[derive(Debug, Default)]
pub struct IdGenerator {
    state: Mutex<IdState>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id based on the current wall clock
    pub fn next_id(&self) -> String {
        self.next_at(Utc::now().timestamp())
    }

    fn next_at(&self, now: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        // A clock that steps backwards keeps counting in the last seen second
        if now > state.second {
            state.second = now;
            state.sequence = 0;
        } else {
            state.sequence += 1;
        }

        format!("{}_{:06}", state.second, state.sequence)
    }
}
