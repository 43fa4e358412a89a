//! Bounded task pool with cooperative cancellation
//!
//! One pool runs one logical phase (scan, probe, rename). Units run
//! concurrently up to the worker count; a unit that fails or panics is logged
//! and reported without disturbing its siblings.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::events::{EventSink, LibraryEvent};

/// Summary returned once a pool has drained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOutcome {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// A bounded set of workers consuming independent units of work
pub struct TaskPool {
    name: String,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    events: EventSink,
    done: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    tasks: JoinSet<()>,
}

impl TaskPool {
    /// Create a pool running at most `workers` units at a time
    pub fn new(
        name: impl Into<String>,
        workers: usize,
        cancel: CancellationToken,
        events: EventSink,
    ) -> Self {
        let name = name.into();
        let workers = workers.max(1);
        debug!(pool = %name, workers, "Task pool created");
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(workers)),
            cancel,
            events,
            done: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            tasks: JoinSet::new(),
        }
    }

    /// Enqueue one unit of work
    ///
    /// Returns `false` when the pool is already cancelled and the unit was
    /// dropped without running.
    pub fn submit<F>(&mut self, message: impl Into<String>, unit: F) -> bool
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            debug!(pool = %self.name, "Pool cancelled, unit rejected");
            return false;
        }

        let message = message.into();
        self.total.fetch_add(1, Ordering::SeqCst);

        let semaphore = self.semaphore.clone();
        let cancel = self.cancel.clone();
        let events = self.events.clone();
        let done = self.done.clone();
        let total = self.total.clone();
        let failed = self.failed.clone();
        let pool = self.name.clone();

        self.tasks.spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };
            if cancel.is_cancelled() {
                return;
            }

            if let Err(e) = unit.await {
                failed.fetch_add(1, Ordering::SeqCst);
                events.error(format!("{}: {:#}", message, e));
            }

            let done = done.fetch_add(1, Ordering::SeqCst) + 1;
            events.emit(LibraryEvent::Progress {
                task: pool,
                message,
                done,
                total: total.load(Ordering::SeqCst),
            });
        });
        true
    }

    /// Current `(done, total)` counters
    pub fn progress(&self) -> (usize, usize) {
        (
            self.done.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until every accepted unit has finished, or until cancellation has
    /// been observed and the in-flight units have drained
    pub async fn await_completion_or_cancel(mut self) -> PoolOutcome {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                self.failed.fetch_add(1, Ordering::SeqCst);
                self.done.fetch_add(1, Ordering::SeqCst);
                error!(pool = %self.name, error = %e, "Task panicked");
                self.events.error(format!("{}: task aborted ({})", self.name, e));
            }
        }

        let (completed, total) = self.progress();
        let outcome = PoolOutcome {
            total,
            completed,
            failed: self.failed.load(Ordering::SeqCst),
            cancelled: self.cancel.is_cancelled(),
        };
        info!(
            pool = %self.name,
            completed = outcome.completed,
            total = outcome.total,
            failed = outcome.failed,
            cancelled = outcome.cancelled,
            "Task pool drained"
        );
        outcome
    }
}
