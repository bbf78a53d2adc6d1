//! Fallback values shared by step definitions, script loading, and config.
//!
//! Scripts may omit most per-step fields; the loader and the serde defaults
//! on the workflow types both resolve omissions against this table, and the
//! `[defaults]` config section overrides a subset of it per installation.

use std::time::Duration;

/// Minimum match confidence for a step to act on a template.
pub const MATCH_THRESHOLD: f32 = 0.7;

/// Minimum match confidence for an `until` loop probe to end the loop.
pub const LOOP_BREAK_THRESHOLD: f32 = 0.8;

/// Attempts before a step gives up matching its template.
pub const MAX_ATTEMPTS: u32 = 10;

/// Pause between match attempts, in seconds.
pub const RETRY_DELAY_SECS: f64 = 1.0;

/// Pause before a step starts matching, in seconds.
pub const START_DELAY_SECS: f64 = 0.0;

/// Pause after a step's action has been performed, in seconds.
pub const END_DELAY_SECS: f64 = 1.0;

/// Post-action verification probes before giving up on disappearance.
pub const VERIFY_ATTEMPTS: u32 = 3;

/// Pause between post-action verification probes, in seconds.
pub const VERIFY_DELAY_SECS: f64 = 1.0;

/// Pause between loop iterations, in seconds.
pub const ITERATION_DELAY_SECS: f64 = 0.0;

/// Hard upper bound on iterations of an `until` loop.
pub const LOOP_SAFETY_CAP: u32 = 1000;

/// Pause between full workflow cycles when running in loop mode, in seconds.
pub const CYCLE_DELAY_SECS: f64 = 2.0;

/// Progress events buffered per consumer before a slow one skips ahead.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// How often interactive surfaces poll for a stop request.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Minimum interval between window geometry refreshes for window capture.
pub const WINDOW_REFRESH_INTERVAL: Duration = Duration::from_secs(2);
