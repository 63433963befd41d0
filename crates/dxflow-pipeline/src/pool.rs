//! Bounded worker pool for triggered runs and registration sweeps.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

/// What came back from [`WorkerPool::join_with_deadline`].
#[derive(Debug)]
pub struct PoolOutcome<T> {
    /// Results of tasks that finished before the deadline, in completion order.
    pub completed: Vec<T>,
    /// Tasks that panicked.
    pub panicked: usize,
    /// Tasks still running at the deadline; they keep running detached.
    pub detached: usize,
}

impl<T> PoolOutcome<T> {
    pub fn timed_out(&self) -> bool {
        self.detached > 0
    }
}

/// Runs submitted tasks with at most `workers` of them in flight.
pub struct WorkerPool<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<T>,
    workers: usize,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            tasks: JoinSet::new(),
            workers,
        }
    }

    /// Pool for one-off operator invocations.
    pub fn single() -> Self {
        Self::new(1)
    }

    /// Pool for bulk sweeps.
    pub fn bulk(workers: usize) -> Self {
        Self::new(workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Tasks submitted and not yet joined.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Queue a task. It starts once a worker slot is free.
    pub fn submit<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            // The semaphore is never closed, so acquiring only waits.
            let _permit = permits.acquire_owned().await;
            task.await
        });
    }

    /// Wait for every task, giving up at `timeout`.
    ///
    /// Tasks still running at the deadline are detached, not aborted.
    pub async fn join_with_deadline(mut self, timeout: Duration) -> PoolOutcome<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut outcome = PoolOutcome {
            completed: Vec::new(),
            panicked: 0,
            detached: 0,
        };

        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(Ok(value))) => outcome.completed.push(value),
                Ok(Some(Err(e))) => {
                    error!(error = %e, "Worker task failed");
                    outcome.panicked += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    outcome.detached = self.tasks.len();
                    warn!(
                        outstanding = outcome.detached,
                        timeout_secs = timeout.as_secs(),
                        "Worker pool deadline reached, leaving tasks running"
                    );
                    self.tasks.detach_all();
                    break;
                }
            }
        }

        outcome
    }

    /// Wait for every task with no deadline.
    pub async fn join_all(mut self) -> PoolOutcome<T> {
        let mut outcome = PoolOutcome {
            completed: Vec::new(),
            panicked: 0,
            detached: 0,
        };
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(value) => outcome.completed.push(value),
                Err(e) => {
                    error!(error = %e, "Worker task failed");
                    outcome.panicked += 1;
                }
            }
        }
        outcome
    }
}
