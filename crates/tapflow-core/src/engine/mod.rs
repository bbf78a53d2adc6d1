//! Workflow engine core: plan flattening, step execution, and run control.
//!
//! This module contains the "brain" of tapflow:
//! - `flatten` -- definition tree to linear execution plan, loop bounds table
//! - `loop_state` -- iteration tracking for one active loop instance
//! - `transform` -- match-space to action-space coordinate mapping
//! - `context` -- collaborator bundle shared across a run, cancellable sleeps
//! - `step` -- one step's capture/match/act cycle with retry and timeout
//! - `recovery` -- failure policy to recovery action resolution
//! - `executor` -- the state machine interpreting the plan
//! - `controller` -- run lifecycle: start/stop/status/wait on a worker task

pub mod context;
pub mod controller;
pub mod executor;
pub mod flatten;
pub mod loop_state;
pub mod recovery;
pub mod step;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;
