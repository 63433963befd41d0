//! Periodic registration of finished attempts.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dxflow_config::SchedulerSettings;
use dxflow_types::{AttemptStatus, WorkflowRunAttempt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::pool::WorkerPool;
use crate::registrar::{ArtifactRegistrar, RegistrationReport};

/// Work performed on every poller tick.
#[async_trait]
pub trait PollTask: Send + Sync {
    async fn tick(&self);
}

/// Fixed-interval trigger with an initial delay and explicit stop.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicPoller {
    initial_delay: Duration,
    period: Duration,
}

impl PeriodicPoller {
    pub fn new(initial_delay: Duration, period: Duration) -> Self {
        Self {
            initial_delay,
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        Self::new(settings.initial_delay(), settings.period())
    }

    /// Spawn the loop. A tick in progress finishes before the loop stops.
    pub fn start(&self, task: Arc<dyn PollTask>) -> PollerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let initial_delay = self.initial_delay;
        let period = self.period;

        let join = tokio::spawn(async move {
            info!(
                initial_delay_secs = initial_delay.as_secs(),
                period_secs = period.as_secs(),
                "Poller started"
            );
            let mut ticks = 0u64;

            tokio::select! {
                _ = tokio::time::sleep(initial_delay) => {}
                _ = token.cancelled() => {
                    info!(ticks, "Poller stopped");
                    return ticks;
                }
            }

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = token.cancelled() => break,
                }
                debug!(tick = ticks + 1, "Poller tick");
                task.tick().await;
                ticks += 1;
            }

            info!(ticks, "Poller stopped");
            ticks
        });

        PollerHandle { cancel, join }
    }
}

/// Handle to a running poller.
pub struct PollerHandle {
    cancel: CancellationToken,
    join: JoinHandle<u64>,
}

impl PollerHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the loop and return the number of completed ticks.
    pub async fn stop(self) -> u64 {
        self.cancel.cancel();
        match self.join.await {
            Ok(ticks) => ticks,
            Err(e) => {
                error!(error = %e, "Poller task failed");
                0
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration sweep
// ─────────────────────────────────────────────────────────────────────────────

/// Per-attempt outcome of a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepEntry {
    pub attempt_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RegistrationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the attempt was marked as registered afterwards.
    pub marked: bool,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    pub attempts: usize,
    pub entries: Vec<SweepEntry>,
    /// Registrations still running when the barrier gave up.
    pub detached: usize,
    /// Attempts left alone because an earlier registration is still running.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub in_flight: Vec<i64>,
}

impl SweepSummary {
    pub fn marked(&self) -> usize {
        self.entries.iter().filter(|e| e.marked).count()
    }
}

/// Registers finished attempts of one workflow on the bulk pool.
pub struct RegistrationSweep {
    workflow_name: String,
    registrar: Arc<ArtifactRegistrar>,
    workers: usize,
    barrier_timeout: Duration,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

/// Holds an attempt id in the in-flight set until dropped.
struct InFlight {
    attempt_id: i64,
    set: Arc<Mutex<HashSet<i64>>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.lock().remove(&self.attempt_id);
    }
}

impl RegistrationSweep {
    pub fn new(
        workflow_name: impl Into<String>,
        registrar: Arc<ArtifactRegistrar>,
        scheduler: &SchedulerSettings,
    ) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            registrar,
            workers: scheduler.bulk_workers,
            barrier_timeout: scheduler.barrier_timeout(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Register done attempts not yet marked as registered.
    pub async fn sweep_pending(&self) -> Result<SweepSummary> {
        let attempts = self
            .registrar
            .repository()
            .pending_registration(&self.workflow_name)?;
        Ok(self.register_batch(attempts).await)
    }

    /// Register every done attempt, including ones registered before.
    pub async fn sweep_done(&self) -> Result<SweepSummary> {
        let attempts: Vec<WorkflowRunAttempt> = self
            .registrar
            .repository()
            .attempts_for_workflow(&self.workflow_name)?
            .into_iter()
            .filter(|a| a.status == AttemptStatus::Done)
            .collect();
        Ok(self.register_batch(attempts).await)
    }

    /// Ids of attempts whose registration task has not finished yet.
    pub fn in_flight(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.in_flight.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Claim the attempts that are not already being registered.
    fn claim(&self, attempts: Vec<WorkflowRunAttempt>) -> (Vec<(WorkflowRunAttempt, InFlight)>, Vec<i64>) {
        let mut set = self.in_flight.lock();
        let mut claimed = Vec::with_capacity(attempts.len());
        let mut busy = Vec::new();
        for attempt in attempts {
            if set.insert(attempt.id) {
                let guard = InFlight {
                    attempt_id: attempt.id,
                    set: Arc::clone(&self.in_flight),
                };
                claimed.push((attempt, guard));
            } else {
                busy.push(attempt.id);
            }
        }
        (claimed, busy)
    }

    async fn register_batch(&self, attempts: Vec<WorkflowRunAttempt>) -> SweepSummary {
        let (claimed, busy) = self.claim(attempts);
        if !busy.is_empty() {
            debug!(
                workflow = %self.workflow_name,
                attempts = ?busy,
                "Skipping attempts still being registered"
            );
        }
        info!(
            workflow = %self.workflow_name,
            attempts = claimed.len(),
            workers = self.workers,
            "Registration sweep started"
        );
        let total = claimed.len();
        let mut pool = WorkerPool::bulk(self.workers);
        for (attempt, guard) in claimed {
            let registrar = Arc::clone(&self.registrar);
            pool.submit(async move {
                let _guard = guard;
                register_one(&registrar, &attempt).await
            });
        }

        let outcome = pool.join_with_deadline(self.barrier_timeout).await;
        let mut entries = outcome.completed;
        entries.sort_by_key(|e| e.attempt_id);

        let summary = SweepSummary {
            attempts: total,
            entries,
            detached: outcome.detached,
            in_flight: busy,
        };
        info!(
            workflow = %self.workflow_name,
            attempts = summary.attempts,
            marked = summary.marked(),
            detached = summary.detached,
            "Registration sweep finished"
        );
        summary
    }
}

async fn register_one(registrar: &ArtifactRegistrar, attempt: &WorkflowRunAttempt) -> SweepEntry {
    match registrar.register_attempt(attempt).await {
        Ok(report) => {
            // Command failures leave the attempt pending so the next sweep retries it.
            let marked = if report.failures().next().is_none() {
                match registrar.repository().mark_registered(attempt.id) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(attempt_id = attempt.id, error = %e, "Could not mark attempt registered");
                        false
                    }
                }
            } else {
                false
            };
            SweepEntry {
                attempt_id: attempt.id,
                report: Some(report),
                error: None,
                marked,
            }
        }
        Err(e) => {
            warn!(attempt_id = attempt.id, error = %e, "Attempt registration rejected");
            SweepEntry {
                attempt_id: attempt.id,
                report: None,
                error: Some(e.to_string()),
                marked: false,
            }
        }
    }
}

#[async_trait]
impl PollTask for RegistrationSweep {
    async fn tick(&self) {
        if let Err(e) = self.sweep_pending().await {
            warn!(workflow = %self.workflow_name, error = %e, "Registration sweep failed");
        }
    }
}
