//! Latest-only coalescing runner
//!
//! Calls are funnelled through a single-slot mailbox. While one run is in
//! flight, further submissions overwrite each other and only the most recent
//! one runs next. Nothing runs concurrently with itself.

use std::future::Future;

use tokio::sync::watch;
use tracing::debug;

/// Single-slot mailbox plus the task that drains it
#[derive(Debug)]
pub struct LatestOnly<T> {
    mailbox: watch::Sender<Option<(u64, T)>>,
    finished: watch::Receiver<u64>,
}

impl<T> LatestOnly<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn the runner task on the current tokio runtime
    pub fn spawn<F, Fut>(mut run: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (mailbox, mut inbox) = watch::channel::<Option<(u64, T)>>(None);
        let (finished_tx, finished) = watch::channel(0u64);

        tokio::spawn(async move {
            // Pending values are still delivered after the sender is dropped
            while inbox.changed().await.is_ok() {
                let pending = inbox.borrow_and_update().clone();
                if let Some((seq, value)) = pending {
                    run(value).await;
                    finished_tx.send_replace(seq);
                }
            }
            debug!("Coalescing runner stopped");
        });

        Self { mailbox, finished }
    }

    /// Replace whatever is pending with `value`
    pub fn submit(&self, value: T) {
        self.mailbox.send_modify(|slot| {
            let seq = slot.as_ref().map_or(0, |(seq, _)| *seq) + 1;
            *slot = Some((seq, value));
        });
    }

    /// Wait until everything submitted so far has been covered by a completed run
    pub async fn flush(&self) {
        let target = self.mailbox.borrow().as_ref().map_or(0, |(seq, _)| *seq);
        let mut finished = self.finished.clone();
        let _ = finished.wait_for(|done| *done >= target).await;
    }
}
