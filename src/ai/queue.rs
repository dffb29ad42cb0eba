//! Request Throttling Queue
//!
//! Serializes outbound calls for one provider. Tasks run one at a time in
//! submission order, and each start is spaced at least `min_interval` after
//! the previous start.
//!
//! The queue is a fair `tokio::sync::Mutex` holding the last start instant.
//! The guard is held for the whole task, so a second caller waits in the
//! mutex's FIFO wait list until the first one finishes (successfully or not).
//! A caller whose future is dropped before it acquires the lock leaves the
//! queue without running.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::types::Result;

#[derive(Debug)]
pub struct RequestQueue {
    name: String,
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RequestQueue {
    pub fn new(name: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            name: name.into(),
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Run `task` once every earlier task has finished and the spacing has elapsed.
    ///
    /// The task's own result is returned unchanged; a failure never blocks
    /// later tasks.
    pub async fn run<F, Fut, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_start = self.last_start.lock().await;

        if let Some(previous) = *last_start {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(queue = %self.name, wait_ms = wait.as_millis() as u64, "Throttling request");
                tokio::time::sleep(wait).await;
            }
        }

        *last_start = Some(Instant::now());
        task().await
    }
}
