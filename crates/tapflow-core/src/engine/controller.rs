//! Run lifecycle: start, stop, status, wait.
//!
//! The controller owns the engine's worker task. `start` spawns a run,
//! `stop` cancels its token (cooperative, observed at the engine's
//! boundaries), `status` reads the latest snapshot from any thread, and
//! `wait` joins the worker. At most one run is active at a time; once a run
//! reaches a terminal state a new one may be started.

use std::sync::Mutex;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use tapflow_types::error::EngineError;
use tapflow_types::workflow::{RunMode, RunState, RunStatus, WorkflowDefinition};

use super::context::ExecutionContext;
use super::executor::WorkflowEngine;
use super::flatten::ExecutionPlan;

struct ActiveRun {
    cancellation: CancellationToken,
    handle: Option<JoinHandle<RunState>>,
}

/// Starts, stops and observes engine runs.
///
/// The status channel outlives individual runs; between runs it holds the
/// last run's terminal snapshot (or `Idle` before the first).
pub struct ExecutionController {
    status: watch::Sender<RunStatus>,
    active: Mutex<Option<ActiveRun>>,
}

impl ExecutionController {
    pub fn new() -> Self {
        let (status, _) = watch::channel(RunStatus::idle());
        Self {
            status,
            active: Mutex::new(None),
        }
    }

    /// Spawn a run of `plan` on a worker task.
    ///
    /// Fails with [`EngineError::AlreadyRunning`] while a previous run is
    /// still in flight. The context's cancellation token is the handle
    /// `stop` later pulls.
    pub fn start(
        &self,
        plan: ExecutionPlan,
        mode: RunMode,
        workflow: &WorkflowDefinition,
        ctx: ExecutionContext,
    ) -> Result<(), EngineError> {
        let mut active = self.lock_active();
        if let Some(run) = active.as_ref() {
            let finished = run.handle.as_ref().is_none_or(|h| h.is_finished());
            if !finished {
                return Err(EngineError::AlreadyRunning);
            }
        }

        debug!(run_id = %ctx.run_id, workflow = %workflow.name, %mode, "starting run");
        let engine = WorkflowEngine::new(
            plan,
            mode,
            workflow.name.clone(),
            workflow.on_failure,
            ctx.clone(),
            self.status.clone(),
        );
        let handle = tokio::spawn(engine.run());
        *active = Some(ActiveRun {
            cancellation: ctx.cancellation,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Request a cooperative stop of the active run, if any.
    ///
    /// Returns immediately; the engine observes the cancellation at its next
    /// unit boundary or suspension point.
    pub fn stop(&self) {
        if let Some(run) = self.lock_active().as_ref() {
            debug!("stop requested");
            run.cancellation.cancel();
        }
    }

    /// Latest run status snapshot. Safe to call from any thread.
    pub fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    /// Subscribe to status snapshots as they change.
    pub fn watch_status(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    /// Wait for the active run to finish and return its terminal state.
    ///
    /// Returns the current snapshot's state when no run was started. A
    /// worker task that aborted (it should not; the engine does not panic)
    /// reports `Failed`.
    pub async fn wait(&self) -> RunState {
        let handle = self.lock_active().as_mut().and_then(|run| run.handle.take());
        match handle {
            Some(handle) => match handle.await {
                Ok(state) => state,
                Err(join_error) => {
                    error!(%join_error, "engine worker task aborted");
                    RunState::Failed
                }
            },
            None => self.status().state,
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveRun>> {
        // The mutex only guards start/stop bookkeeping; a poisoned guard
        // still holds usable data.
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
