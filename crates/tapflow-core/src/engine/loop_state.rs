//! Iteration tracking for one active loop instance.

use tapflow_types::workflow::LoopId;

/// Mutable state of one loop the engine is currently inside.
///
/// Created when the engine reaches the loop's `LoopEnter` marker, owned
/// exclusively by the engine's loop stack, dropped when the loop finishes or
/// recovery unwinds it. Only the engine mutates it, and only at loop
/// boundary transitions.
#[derive(Debug, Clone)]
pub struct LoopState {
    pub loop_id: LoopId,
    /// Completed iterations.
    pub iteration: u32,
    /// Step failures recorded during the current iteration.
    pub step_failures: u32,
}

impl LoopState {
    pub fn new(loop_id: LoopId) -> Self {
        Self {
            loop_id,
            iteration: 0,
            step_failures: 0,
        }
    }

    /// Close out an iteration: bump the count, clear per-iteration failures.
    pub fn advance(&mut self) {
        self.iteration += 1;
        self.step_failures = 0;
    }

    /// Back to a fresh first iteration. Used when recovery restarts the loop.
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.step_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.step_failures += 1;
    }

    /// Whether a counted loop should run another iteration.
    pub fn wants_more(&self, iterations: u32) -> bool {
        self.iteration < iterations
    }

    /// Whether an `until` loop has burned through its safety allowance.
    pub fn hit_safety_cap(&self, cap: u32) -> bool {
        self.iteration >= cap
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
