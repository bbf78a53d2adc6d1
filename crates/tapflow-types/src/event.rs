//! Progress events emitted during a run.
//!
//! `ProgressEvent` is the unified event type broadcast while the engine
//! interprets a plan. All variants are Clone + Send + Sync for use with
//! tokio broadcast channels, and serde-tagged for `--json` output.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Position;
use crate::workflow::{LoopId, RecoveryAction, RunMode};

/// Events emitted by the engine as a run progresses.
///
/// Subscribers (CLI rendering, logging) observe these; the engine never
/// formats output itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A run has started interpreting its plan.
    RunStarted {
        run_id: Uuid,
        workflow: String,
        mode: RunMode,
        /// Number of units in the flattened plan.
        total_units: usize,
    },

    /// A step has begun its first attempt.
    StepStarted {
        run_id: Uuid,
        unit: usize,
        name: String,
    },

    /// An attempt did not complete the step; another will follow.
    StepRetrying {
        run_id: Uuid,
        unit: usize,
        name: String,
        /// The attempt that just failed (1-based).
        attempt: u32,
        reason: String,
    },

    /// A step matched its template and performed its action.
    StepCompleted {
        run_id: Uuid,
        unit: usize,
        name: String,
        attempts: u32,
        /// Where the action was performed, in action space.
        position: Position,
        confidence: f32,
    },

    /// A step exhausted its attempts or timed out.
    StepFailed {
        run_id: Uuid,
        unit: usize,
        name: String,
        attempts: u32,
        reason: String,
    },

    /// The engine resolved a step failure into a recovery action.
    RecoveryApplied {
        run_id: Uuid,
        unit: usize,
        action: RecoveryAction,
    },

    /// Execution entered a loop body.
    LoopEntered {
        run_id: Uuid,
        unit: usize,
        loop_id: LoopId,
    },

    /// A loop decided to run another iteration.
    LoopIteration {
        run_id: Uuid,
        loop_id: LoopId,
        /// The iteration about to start (1-based).
        iteration: u32,
    },

    /// A loop finished and execution moved past it.
    LoopExited {
        run_id: Uuid,
        unit: usize,
        loop_id: LoopId,
        iterations: u32,
    },

    /// In loop mode, a full pass over the plan completed.
    CycleCompleted { run_id: Uuid, cycle: u64 },

    /// The run finished successfully.
    RunCompleted { run_id: Uuid },

    /// The run failed.
    RunFailed { run_id: Uuid, error: String },

    /// The run was stopped cooperatively.
    RunCancelled { run_id: Uuid },
}

impl ProgressEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StepStarted { run_id, .. }
            | Self::StepRetrying { run_id, .. }
            | Self::StepCompleted { run_id, .. }
            | Self::StepFailed { run_id, .. }
            | Self::RecoveryApplied { run_id, .. }
            | Self::LoopEntered { run_id, .. }
            | Self::LoopIteration { run_id, .. }
            | Self::LoopExited { run_id, .. }
            | Self::CycleCompleted { run_id, .. }
            | Self::RunCompleted { run_id }
            | Self::RunFailed { run_id, .. }
            | Self::RunCancelled { run_id } => *run_id,
        }
    }

    /// Whether this event ends its run. Subscribers rendering a run can
    /// stop reading after one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunCompleted { .. } | Self::RunFailed { .. } | Self::RunCancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_tags() {
        let event = ProgressEvent::StepCompleted {
            run_id: Uuid::now_v7(),
            unit: 3,
            name: "open-chest".to_string(),
            attempts: 2,
            position: Position::new(120, 640),
            confidence: 0.93,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"step_completed\""));
        assert!(json.contains("open-chest"));

        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ProgressEvent::StepCompleted { .. }));
    }

    #[test]
    fn test_run_id_helper_covers_all_variants() {
        let id = Uuid::now_v7();
        let events = vec![
            ProgressEvent::RunStarted {
                run_id: id,
                workflow: "wf".to_string(),
                mode: RunMode::Once,
                total_units: 4,
            },
            ProgressEvent::StepRetrying {
                run_id: id,
                unit: 0,
                name: "s".to_string(),
                attempt: 1,
                reason: "no match".to_string(),
            },
            ProgressEvent::LoopIteration {
                run_id: id,
                loop_id: LoopId(0),
                iteration: 2,
            },
            ProgressEvent::RunCancelled { run_id: id },
        ];
        for event in events {
            assert_eq!(event.run_id(), id);
        }
    }

    #[test]
    fn test_terminal_events() {
        let id = Uuid::now_v7();
        assert!(ProgressEvent::RunCompleted { run_id: id }.is_terminal());
        assert!(
            ProgressEvent::RunFailed {
                run_id: id,
                error: "boom".to_string()
            }
            .is_terminal()
        );
        assert!(ProgressEvent::RunCancelled { run_id: id }.is_terminal());
        assert!(
            !ProgressEvent::StepStarted {
                run_id: id,
                unit: 0,
                name: "s".to_string()
            }
            .is_terminal()
        );
    }
}
