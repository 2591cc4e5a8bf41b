//! Bounded fan-out of independent units of work
//!
//! Every item runs as its own tokio task, gated by a semaphore so that no
//! more than `concurrency` requests are in flight. A failed, panicked or
//! timed-out item leaves `None` in its slot; the rest of the batch carries on.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default concurrency ceiling
pub const DEFAULT_CONCURRENCY: usize = 30;

/// Runs batches of work with a concurrency ceiling
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    item_timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            item_timeout: None,
        }
    }

    /// Abandons any single item that runs longer than `timeout`
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `work` over every item and collects the results
    ///
    /// The output has the same length and order as `items`. Slot `i` is
    /// `None` when item `i` returned an error, panicked, or exceeded the
    /// item timeout.
    pub async fn run_all<T, R, E, F, Fut>(&self, items: Vec<T>, work: F) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let total = items.len();
        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        if total == 0 {
            return slots;
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let work = Arc::new(work);
        let item_timeout = self.item_timeout;
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let work = Arc::clone(&work);
            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = match item_timeout {
                    Some(limit) => match tokio::time::timeout(limit, (*work)(item)).await {
                        Ok(result) => result.map_err(|e| e.to_string()),
                        Err(_) => Err(format!("timed out after {:?}", limit)),
                    },
                    None => (*work)(item).await.map_err(|e| e.to_string()),
                };
                (index, outcome)
            });
        }

        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(result))) => slots[index] = Some(result),
                Ok((index, Err(message))) => {
                    failed += 1;
                    tracing::warn!("Item {} generated an error while fanning out: {}", index, message);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Worker task aborted: {}", e);
                }
            }
        }

        if failed > 0 {
            tracing::debug!("{} of {} items failed", failed, total);
        }

        slots
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}
