//! Bounded-concurrency dispatch bookkeeping: queued work, in-flight runs,
//! and the typed result each spawned run resolves to.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use hive_core::current_unix_timestamp_ms;
use hive_github::phase_classifier::WorkflowPhase;
use hive_swarm::{SwarmBackend, SwarmRunStatus, SwarmTask};

/// Work accepted for dispatch but not yet started because the in-flight
/// limit was reached. Drains FIFO into the active set.
#[derive(Debug, Clone)]
pub(super) struct PendingDispatch {
    pub(super) task: SwarmTask,
    pub(super) version_key: String,
    pub(super) auto_close_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DispatchStatus {
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl DispatchStatus {
    pub(super) fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }

    /// Reason code embedded in error comments for the non-success statuses.
    pub(super) fn reason_code(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "dispatch_failed",
            Self::TimedOut => "dispatch_timeout",
            Self::Cancelled => "dispatch_cancelled",
        }
    }
}

/// What one spawned run resolved to. Backend faults (`Err` from the seam)
/// surface as `Failed` with the error text as detail.
#[derive(Debug, Clone)]
pub(super) struct DispatchResult {
    pub(super) status: DispatchStatus,
    pub(super) detail: Option<String>,
    pub(super) duration_ms: u64,
}

/// One in-flight run. The watch sender cancels it; the handle resolves to
/// its typed result. Metadata sticks around for the exit transition.
#[derive(Debug)]
pub(super) struct ActiveDispatch {
    pub(super) run_id: String,
    pub(super) version_key: String,
    pub(super) phase: WorkflowPhase,
    pub(super) auto_close_requested: bool,
    pub(super) started_unix_ms: u64,
    pub(super) cancel_tx: watch::Sender<bool>,
    pub(super) handle: JoinHandle<DispatchResult>,
}

/// Starts one backend run under the hard dispatch timeout. On timeout the
/// run's cancel watch is flipped and the backend future is dropped, which
/// kills a process backend's child via `kill_on_drop`.
pub(super) fn spawn_dispatch(
    backend: Arc<dyn SwarmBackend>,
    pending: PendingDispatch,
    timeout: Duration,
) -> ActiveDispatch {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let cancel_on_timeout = cancel_tx.clone();
    let run_id = pending.task.run_id.clone();
    let phase = pending.task.phase;
    let started_unix_ms = current_unix_timestamp_ms();
    let task = pending.task;
    let handle = tokio::spawn(async move {
        let started = Instant::now();
        let outcome = tokio::select! {
            outcome = backend.run(task, cancel_rx) => outcome,
            _ = tokio::time::sleep(timeout) => {
                let _ = cancel_on_timeout.send(true);
                return DispatchResult {
                    status: DispatchStatus::TimedOut,
                    detail: Some(format!(
                        "dispatch exceeded timeout of {}ms",
                        timeout.as_millis()
                    )),
                    duration_ms: started.elapsed().as_millis() as u64,
                };
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(outcome) => DispatchResult {
                status: match outcome.status {
                    SwarmRunStatus::Completed => DispatchStatus::Completed,
                    SwarmRunStatus::Failed => DispatchStatus::Failed,
                    SwarmRunStatus::Cancelled => DispatchStatus::Cancelled,
                },
                detail: outcome.detail,
                duration_ms,
            },
            Err(error) => DispatchResult {
                status: DispatchStatus::Failed,
                detail: Some(format!("{error:#}")),
                duration_ms,
            },
        }
    });
    ActiveDispatch {
        run_id,
        version_key: pending.version_key,
        phase,
        auto_close_requested: pending.auto_close_requested,
        started_unix_ms,
        cancel_tx,
        handle,
    }
}
