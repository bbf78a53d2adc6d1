//! Failure policy to recovery action resolution.

use tapflow_types::error::EngineError;
use tapflow_types::workflow::{FailurePolicy, RecoveryAction};

/// Resolve what the engine should do about a permanently failed step.
///
/// The step's own policy wins, then the workflow default, then abort. A
/// `restart_loop` policy needs an enclosing loop: with an empty loop stack it
/// degrades to an abort carrying a configuration error, which the engine
/// reports as the run's failure.
///
/// Pure: decisions never mutate engine state, the engine applies them.
pub fn decide(
    step_policy: Option<FailurePolicy>,
    workflow_policy: Option<FailurePolicy>,
    loop_depth: usize,
) -> Result<RecoveryAction, EngineError> {
    let policy = step_policy.or(workflow_policy).unwrap_or_default();
    match policy {
        FailurePolicy::Abort => Ok(RecoveryAction::Abort),
        FailurePolicy::SkipStep => Ok(RecoveryAction::SkipStep),
        FailurePolicy::RestartLoop if loop_depth == 0 => Err(EngineError::Configuration(
            "restart_loop declared outside of any loop".to_string(),
        )),
        FailurePolicy::RestartLoop => Ok(RecoveryAction::RestartNearestLoop),
        FailurePolicy::RestartWorkflow => Ok(RecoveryAction::RestartWorkflow),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
