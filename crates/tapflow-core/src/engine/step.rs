//! One step's capture/match/act cycle with retry and timeout.

use tokio::time::Instant;
use tracing::{debug, warn};

use tapflow_types::error::StepFailure;
use tapflow_types::event::ProgressEvent;
use tapflow_types::geometry::Position;
use tapflow_types::matching::MatchResult;
use tapflow_types::workflow::{StepDefinition, VerifyPolicy};

use super::context::ExecutionContext;
use super::transform::to_action_space;

/// Result of driving one step to completion.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Success {
        attempts: u32,
    },
    Failure {
        reason: StepFailure,
        attempts: u32,
    },
    /// The run was cancelled while the step was in flight.
    Cancelled,
}

/// One attempt's result, internal to the retry loop.
enum Attempt {
    Completed { position: Position, confidence: f32 },
    Retry { reason: String, error: Option<StepFailure> },
    Cancelled,
}

enum Verify {
    Absent,
    StillPresent,
    Cancelled,
}

/// Execute one step: capture, match, act, with the step's retry policy.
///
/// Loops up to `max_attempts` or until the step's wall-clock timeout elapses,
/// whichever trips first. A qualifying match leads to the action, the end
/// delay, and optional disappearance verification; anything else consumes an
/// attempt and sleeps the retry interval (the primary cancellation point).
/// Collaborator errors consume attempts the same way a miss does, so a
/// transient capture hiccup does not kill the run.
///
/// Emits step-level progress events; performs no output formatting itself.
pub async fn execute_step(
    step: &StepDefinition,
    ctx: &ExecutionContext,
    unit: usize,
) -> StepOutcome {
    ctx.events.publish(ProgressEvent::StepStarted {
        run_id: ctx.run_id,
        unit,
        name: step.name.clone(),
    });

    if !ctx.sleep(step.start_delay()).await {
        return StepOutcome::Cancelled;
    }

    let deadline = step.retry.timeout().map(|t| Instant::now() + t);
    let max_attempts = step.retry.max_attempts;
    let mut last_error: Option<StepFailure> = None;

    for attempt in 1..=max_attempts {
        if ctx.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                debug!(step = %step.name, attempt, "step timeout reached");
                return fail(ctx, step, unit, last_error, attempt - 1);
            }
        }

        match attempt_once(step, ctx).await {
            Attempt::Completed {
                position,
                confidence,
            } => {
                debug!(
                    step = %step.name,
                    %position,
                    confidence,
                    attempt,
                    "step completed"
                );
                ctx.events.publish(ProgressEvent::StepCompleted {
                    run_id: ctx.run_id,
                    unit,
                    name: step.name.clone(),
                    attempts: attempt,
                    position,
                    confidence,
                });
                return StepOutcome::Success { attempts: attempt };
            }
            Attempt::Retry { reason, error } => {
                if error.is_some() {
                    warn!(step = %step.name, attempt, %reason, "attempt failed");
                }
                last_error = error;
                if attempt < max_attempts {
                    ctx.events.publish(ProgressEvent::StepRetrying {
                        run_id: ctx.run_id,
                        unit,
                        name: step.name.clone(),
                        attempt,
                        reason,
                    });
                    if !ctx.sleep(step.retry.retry_delay()).await {
                        return StepOutcome::Cancelled;
                    }
                }
            }
            Attempt::Cancelled => return StepOutcome::Cancelled,
        }
    }

    fail(ctx, step, unit, last_error, max_attempts)
}

/// Report a permanent failure: the last collaborator error when the final
/// attempt errored, otherwise a match timeout.
fn fail(
    ctx: &ExecutionContext,
    step: &StepDefinition,
    unit: usize,
    last_error: Option<StepFailure>,
    attempts: u32,
) -> StepOutcome {
    let reason = last_error.unwrap_or(StepFailure::MatchTimeout { attempts });
    ctx.events.publish(ProgressEvent::StepFailed {
        run_id: ctx.run_id,
        unit,
        name: step.name.clone(),
        attempts,
        reason: reason.to_string(),
    });
    StepOutcome::Failure { reason, attempts }
}

async fn attempt_once(step: &StepDefinition, ctx: &ExecutionContext) -> Attempt {
    let frame = match ctx.source.capture(step.region).await {
        Ok(frame) => frame,
        Err(failure) => return retry_on(failure),
    };

    let result = match ctx.matcher.find(&frame, &step.template, step.threshold).await {
        Ok(result) => result,
        Err(failure) => return retry_on(failure),
    };

    let MatchResult::Found {
        position,
        confidence,
    } = result
    else {
        return Attempt::Retry {
            reason: "template not matched".to_string(),
            error: None,
        };
    };

    let target = to_action_space(
        position,
        step.offset,
        step.region,
        ctx.source.calibration(),
        ctx.target,
    );

    if let Err(failure) = ctx.backend.prepare().await {
        return retry_on(failure);
    }
    if let Err(failure) = ctx.backend.perform(&step.action, target).await {
        return retry_on(failure);
    }

    if !ctx.sleep(step.end_delay()).await {
        return Attempt::Cancelled;
    }

    if let Some(verify) = &step.verify {
        match verify_absent(step, verify, ctx).await {
            Verify::Absent => {}
            Verify::StillPresent => {
                return Attempt::Retry {
                    reason: "template still present after action".to_string(),
                    error: None,
                };
            }
            Verify::Cancelled => return Attempt::Cancelled,
        }
    }

    Attempt::Completed {
        position: target,
        confidence,
    }
}

fn retry_on(failure: StepFailure) -> Attempt {
    Attempt::Retry {
        reason: failure.to_string(),
        error: Some(failure),
    }
}

/// Probe until the step's template disappears, confirming the action took.
///
/// Sleeps the verify delay before each probe. A probe that errors is
/// inconclusive and counts like a still-present sighting.
async fn verify_absent(
    step: &StepDefinition,
    verify: &VerifyPolicy,
    ctx: &ExecutionContext,
) -> Verify {
    for probe in 1..=verify.attempts {
        if !ctx.sleep(verify.delay()).await {
            return Verify::Cancelled;
        }
        if ctx.is_cancelled() {
            return Verify::Cancelled;
        }

        let gone = match ctx.source.capture(step.region).await {
            Ok(frame) => matches!(
                ctx.matcher.find(&frame, &step.template, step.threshold).await,
                Ok(MatchResult::NoMatch)
            ),
            Err(_) => false,
        };
        if gone {
            debug!(step = %step.name, probe, "disappearance verified");
            return Verify::Absent;
        }
    }
    Verify::StillPresent
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
