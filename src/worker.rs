//! Bounded pool for CPU-bound work.
//!
//! Extraction, chunking and scoring run on tokio's blocking threads, gated
//! by a semaphore so at most `[workers] max_blocking` jobs run at once.
//! Further callers queue on the semaphore.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `f` on a blocking thread once a permit is free, and wait for it.
    ///
    /// The permit travels with the job, so a caller that stops waiting does
    /// not free the slot until the job itself returns.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .context("worker pool closed")?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .context("worker task panicked")
    }
}
