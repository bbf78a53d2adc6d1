//! Execution context shared across one run.
//!
//! `ExecutionContext` bundles the collaborators a run drives (frame source,
//! matcher, action backend), the event bus, and the cancellation token. It is
//! created by the execution controller, cloned into the worker task, and
//! lives for exactly one run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tapflow_types::defaults::{CYCLE_DELAY_SECS, LOOP_SAFETY_CAP};
use tapflow_types::geometry::TargetGeometry;

use crate::event::EventBus;
use crate::ports::{ActionBackend, FrameSource, TemplateMatcher};

/// Collaborators and run-scoped policy shared by every engine component.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Unique identifier for this run.
    pub run_id: Uuid,
    pub source: Arc<dyn FrameSource>,
    pub matcher: Arc<dyn TemplateMatcher>,
    pub backend: Arc<dyn ActionBackend>,
    pub events: EventBus,
    /// Cooperative cancellation signal; the only externally-mutated state.
    pub cancellation: CancellationToken,
    /// Destination geometry for the coordinate transform, when configured.
    pub target: Option<TargetGeometry>,
    /// Hard iteration bound for `until` loops.
    pub loop_safety_cap: u32,
    /// Pause between workflow cycles in loop mode, in seconds.
    pub cycle_delay_secs: f64,
}

impl ExecutionContext {
    /// Context with a fresh run id and token and default run policy.
    pub fn new(
        source: Arc<dyn FrameSource>,
        matcher: Arc<dyn TemplateMatcher>,
        backend: Arc<dyn ActionBackend>,
        events: EventBus,
    ) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            source,
            matcher,
            backend,
            events,
            cancellation: CancellationToken::new(),
            target: None,
            loop_safety_cap: LOOP_SAFETY_CAP,
            cycle_delay_secs: CYCLE_DELAY_SECS,
        }
    }

    /// Pause between workflow cycles in loop mode.
    pub fn cycle_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.cycle_delay_secs).unwrap_or_default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// Returns `true` when the full duration elapsed, `false` when the run
    /// was cancelled before or during the sleep. Every delay the engine
    /// applies goes through here, which is what keeps stop requests prompt.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.cancellation.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("run_id", &self.run_id)
            .field("source", &self.source.name())
            .field("backend", &self.backend.name())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
