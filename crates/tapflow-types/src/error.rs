use thiserror::Error;

use crate::workflow::LoopId;

/// Fatal engine errors. Any of these ends the run as `Failed`.
///
/// Cancellation is deliberately not here: a stopped run finishes as the
/// `Cancelled` status, not as an error.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("loop {loop_id} exceeded the safety limit after {iterations} iterations")]
    LoopSafetyLimitExceeded { loop_id: LoopId, iterations: u32 },

    #[error("a run is already active")]
    AlreadyRunning,
}

/// Recoverable per-step failures.
///
/// These cross the collaborator port boundary (capture, matching, input) and
/// feed the failure policy machinery rather than ending the run outright.
#[derive(Debug, Clone, Error)]
pub enum StepFailure {
    #[error("template not matched after {attempts} attempts")]
    MatchTimeout { attempts: u32 },

    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("template unavailable: {0}")]
    TemplateUnavailable(String),

    #[error("action failed: {0}")]
    ActionFailed(String),
}
