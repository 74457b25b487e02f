//! Analysis job poller — follow a long-running backend job to completion.
//!
//! Each watched job runs one background task that checks the status endpoint
//! on a fixed interval. Checks never overlap: the next tick is only taken after
//! the previous response has been applied.
//!
//! State machine:
//! - `Idle` ⇄ `Polling` via [`PollerHandle::stop`] / [`PollerHandle::start`].
//! - `Polling` → `Terminal` when the job reports `completed` or `failed`.
//!   The outcome is delivered once through a one-shot channel and the task exits.
//! - A 404 means the job record does not exist yet; it is ignored.
//! - Other failures are counted. Once `max_consecutive_failures` is reached the
//!   error is exposed on the snapshot and a one-shot alert fires, but polling
//!   continues. `start` after a fired alert arms a fresh one for the next run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::AnalysisBackend;
use crate::config::PollingConfig;
use crate::error::ApiError;
use crate::types::{AnalysisStatus, JobStatus};

/// Reported when a failed job carries no message of its own.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Analysis failed";

/// Sending half of the failure alert, shared so `start` can re-arm it.
type AlertSlot = Arc<Mutex<Option<oneshot::Sender<ApiError>>>>;

/// Per-session polling options.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Start in `Polling` (true) or `Idle` (false).
    pub enabled: bool,
    pub max_consecutive_failures: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            enabled: true,
            max_consecutive_failures: 5,
        }
    }
}

impl From<&PollingConfig> for PollOptions {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            enabled: true,
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

impl PollOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn paused(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    Idle,
    Polling,
    Terminal,
}

/// Observable state of a polling session.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSnapshot {
    pub job_id: String,
    pub phase: PollPhase,
    /// Last status received from the backend.
    pub status: Option<AnalysisStatus>,
    /// Set once the failure limit is reached; cleared by `start`.
    pub error: Option<ApiError>,
    pub consecutive_failures: u32,
    /// Status requests answered so far, including 404s and failures.
    pub attempts: u64,
    pub last_checked: Option<DateTime<Utc>>,
}

impl PollSnapshot {
    fn new(job_id: String, phase: PollPhase) -> Self {
        Self {
            job_id,
            phase,
            status: None,
            error: None,
            consecutive_failures: 0,
            attempts: 0,
            last_checked: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.phase == PollPhase::Polling
    }
}

/// How a watched job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(AnalysisStatus),
    Failed {
        message: String,
        status: AnalysisStatus,
    },
}

impl JobOutcome {
    fn from_terminal(status: AnalysisStatus) -> Self {
        match status.status {
            JobStatus::Completed => Self::Completed(status),
            _ => {
                let message = status
                    .message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                Self::Failed { message, status }
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Start watching `job_id`. Must be called from within a tokio runtime.
///
/// Watching a different id means calling `watch_job` again; drop the old handle
/// to tear its session down.
pub fn watch_job<B>(backend: Arc<B>, job_id: impl Into<String>, options: PollOptions) -> PollerHandle
where
    B: AnalysisBackend + ?Sized + 'static,
{
    let job_id = job_id.into();
    let phase = if options.enabled {
        PollPhase::Polling
    } else {
        PollPhase::Idle
    };
    let snapshot = Arc::new(watch::channel(PollSnapshot::new(job_id.clone(), phase)).0);
    let (enabled_tx, enabled_rx) = watch::channel(options.enabled);
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (alert_tx, alert_rx) = oneshot::channel();
    let alert_slot: AlertSlot = Arc::new(Mutex::new(Some(alert_tx)));
    let cancel = CancellationToken::new();

    let task = PollTask {
        backend,
        job_id,
        interval: options.interval,
        max_failures: options.max_consecutive_failures.max(1),
        snapshot: snapshot.clone(),
        enabled: enabled_rx,
        cancel: cancel.clone(),
        outcome: Some(outcome_tx),
        alert: alert_slot.clone(),
    };
    let task = tokio::spawn(task.run());

    PollerHandle {
        snapshot,
        enabled: enabled_tx,
        outcome: Some(outcome_rx),
        alert: Mutex::new(Some(alert_rx)),
        alert_slot,
        cancel,
        task: Some(task),
    }
}

/// Caller's side of a polling session. Dropping it cancels the session.
pub struct PollerHandle {
    snapshot: Arc<watch::Sender<PollSnapshot>>,
    enabled: watch::Sender<bool>,
    outcome: Option<oneshot::Receiver<JobOutcome>>,
    alert: Mutex<Option<oneshot::Receiver<ApiError>>>,
    alert_slot: AlertSlot,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn status(&self) -> Option<AnalysisStatus> {
        self.snapshot.borrow().status.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.snapshot.borrow().is_polling()
    }

    pub fn error(&self) -> Option<ApiError> {
        self.snapshot.borrow().error.clone()
    }

    /// Resume polling from `Idle`, clearing any surfaced error.
    ///
    /// Checks immediately. If the alert already fired, a new one is armed so
    /// the next run of failures is reported too. No-op while polling or once
    /// terminal.
    pub fn start(&self) {
        let mut resumed = false;
        self.snapshot.send_if_modified(|s| {
            if s.phase != PollPhase::Idle {
                return false;
            }
            s.phase = PollPhase::Polling;
            s.error = None;
            s.consecutive_failures = 0;
            resumed = true;
            true
        });
        if resumed {
            debug!(job_id = %self.snapshot.borrow().job_id, "Polling resumed");
            self.rearm_alert();
            self.enabled.send_replace(true);
        }
    }

    /// Pause polling. Any in-flight check is abandoned and its response discarded.
    ///
    /// No-op unless polling.
    pub fn stop(&self) {
        let mut paused = false;
        self.snapshot.send_if_modified(|s| {
            if s.phase != PollPhase::Polling {
                return false;
            }
            s.phase = PollPhase::Idle;
            paused = true;
            true
        });
        if paused {
            debug!(job_id = %self.snapshot.borrow().job_id, "Polling paused");
            self.enabled.send_replace(false);
        }
    }

    /// Wait for the job to finish.
    ///
    /// Yields the outcome at most once; `None` if it was already taken or the
    /// session ended without reaching a terminal state.
    pub async fn outcome(&mut self) -> Option<JobOutcome> {
        let rx = self.outcome.take()?;
        rx.await.ok()
    }

    /// Wait for the failure limit to be reached.
    ///
    /// Fires at most once per run of failures: after it fires, only `start`
    /// arms the next one. `None` if already taken or the session ended first.
    pub async fn alert(&mut self) -> Option<ApiError> {
        let rx = self.alert.get_mut().ok()?.take()?;
        rx.await.ok()
    }

    fn rearm_alert(&self) {
        let Ok(mut slot) = self.alert_slot.lock() else {
            return;
        };
        if slot.is_some() {
            return;
        }
        let (tx, rx) = oneshot::channel();
        *slot = Some(tx);
        if let Ok(mut alert) = self.alert.lock() {
            *alert = Some(rx);
        }
    }

    /// Cancel the session and wait for its task to exit.
    pub async fn shutdown(mut self) {
        self.halt();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn halt(&self) {
        self.snapshot.send_if_modified(|s| {
            if s.phase != PollPhase::Polling {
                return false;
            }
            s.phase = PollPhase::Idle;
            true
        });
        self.cancel.cancel();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.halt();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct PollTask<B: ?Sized> {
    backend: Arc<B>,
    job_id: String,
    interval: Duration,
    max_failures: u32,
    snapshot: Arc<watch::Sender<PollSnapshot>>,
    enabled: watch::Receiver<bool>,
    cancel: CancellationToken,
    outcome: Option<oneshot::Sender<JobOutcome>>,
    alert: AlertSlot,
}

impl<B: ?Sized> Drop for PollTask<B> {
    // Close the alert so a pending `alert()` resolves once the session is over.
    fn drop(&mut self) {
        if let Ok(mut slot) = self.alert.lock() {
            slot.take();
        }
    }
}

impl<B: AnalysisBackend + ?Sized> PollTask<B> {
    async fn run(mut self) {
        loop {
            // Idle until enabled.
            while !*self.enabled.borrow_and_update() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    changed = self.enabled.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }

            if self.poll_until_paused().await.is_break() {
                return;
            }
        }
    }

    /// Poll on the interval. `Continue` means paused, `Break` means the session is over.
    async fn poll_until_paused(&mut self) -> ControlFlow<()> {
        // The first tick completes immediately.
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return ControlFlow::Break(()),
                changed = self.enabled.changed() => {
                    return if changed.is_err() { ControlFlow::Break(()) } else { ControlFlow::Continue(()) };
                }
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return ControlFlow::Break(()),
                changed = self.enabled.changed() => {
                    return if changed.is_err() { ControlFlow::Break(()) } else { ControlFlow::Continue(()) };
                }
                result = self.backend.get_status(&self.job_id) => result,
            };

            self.apply(result)?;
        }
    }

    fn apply(&mut self, result: Result<AnalysisStatus, ApiError>) -> ControlFlow<()> {
        match result {
            Ok(status) => self.apply_status(status),
            Err(e) if e.is_not_found() => {
                debug!(job_id = %self.job_id, "Analysis status not found yet, still initializing");
                self.record(|s| s.attempts += 1);
                ControlFlow::Continue(())
            }
            Err(e) => {
                self.apply_failure(e);
                ControlFlow::Continue(())
            }
        }
    }

    fn apply_status(&mut self, status: AnalysisStatus) -> ControlFlow<()> {
        let terminal = status.status.is_terminal();
        let accepted = self.record(|s| {
            s.status = Some(status.clone());
            s.consecutive_failures = 0;
            s.attempts += 1;
            s.last_checked = Some(Utc::now());
            if terminal {
                s.phase = PollPhase::Terminal;
            }
        });
        if !accepted || !terminal {
            return ControlFlow::Continue(());
        }

        let outcome = JobOutcome::from_terminal(status);
        match &outcome {
            JobOutcome::Completed(_) => info!(job_id = %self.job_id, "Analysis completed"),
            JobOutcome::Failed { message, .. } => {
                warn!(job_id = %self.job_id, message = %message, "Analysis failed")
            }
        }
        if let Some(tx) = self.outcome.take() {
            let _ = tx.send(outcome);
        }
        ControlFlow::Break(())
    }

    fn apply_failure(&mut self, err: ApiError) {
        warn!(
            job_id = %self.job_id,
            error = %err,
            transient = err.is_transient(),
            "Failed to fetch analysis status"
        );
        let max_failures = self.max_failures;
        let mut surfaced = false;
        self.record(|s| {
            s.consecutive_failures += 1;
            s.attempts += 1;
            s.last_checked = Some(Utc::now());
            if s.consecutive_failures >= max_failures {
                s.error = Some(err.clone());
                surfaced = true;
            }
        });
        if surfaced && let Some(tx) = self.alert.lock().ok().and_then(|mut slot| slot.take()) {
            error!(
                job_id = %self.job_id,
                failures = max_failures,
                error = %err,
                "Status checks keep failing"
            );
            let _ = tx.send(err);
        }
    }

    /// Mutate the snapshot if the session is still polling.
    ///
    /// Returns false when the caller paused or cancelled in the meantime, in
    /// which case the response is stale and dropped.
    fn record(&self, update: impl FnOnce(&mut PollSnapshot)) -> bool {
        self.snapshot.send_if_modified(|s| {
            if s.phase != PollPhase::Polling {
                return false;
            }
            update(s);
            true
        })
    }
}
