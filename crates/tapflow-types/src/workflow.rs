//! Workflow domain types for tapflow.
//!
//! A workflow is an ordered tree of steps and loops. Steps locate a template
//! image on the capture target and perform an input action at the match;
//! loops repeat a body a fixed number of times or until a template appears.
//! These types are the canonical in-memory representation; YAML scripts are
//! parsed into them by the loader.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::geometry::{Position, Region};

/// Non-panicking seconds-to-`Duration` conversion; negative and non-finite
/// inputs collapse to zero.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The input primitive a step performs at the matched position.
///
/// Serializes unit variants as bare strings (`tap`, `long_press`) so scripts
/// read naturally; `swipe` carries its parameters as a nested map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Single primary click or tap.
    #[default]
    Tap,
    /// Two taps in quick succession.
    DoubleTap,
    /// Context click; touch backends render this as a long press.
    SecondaryTap,
    /// Press and hold.
    LongPress,
    /// Position the pointer without clicking. No-op on touch backends.
    MoveTo,
    /// Drag from the matched position by `(dx, dy)`.
    Swipe { dx: i32, dy: i32, duration_ms: u64 },
}

// ---------------------------------------------------------------------------
// Step definition
// ---------------------------------------------------------------------------

/// A single locate-and-act unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Display name, used in progress output and logs.
    pub name: String,
    /// Template image path, relative to the templates directory.
    pub template: String,
    /// Restrict capture and matching to this area of the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    /// Minimum confidence for a match to count.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// What to do at the matched position.
    #[serde(default)]
    pub action: ActionKind,
    /// Displacement applied to the matched position before acting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Position>,
    /// Match retry behavior.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Pause before the first match attempt, in seconds.
    #[serde(default)]
    pub start_delay_secs: f64,
    /// Pause after the action has been performed, in seconds.
    #[serde(default = "default_end_delay")]
    pub end_delay_secs: f64,
    /// Post-action check that the template disappeared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<VerifyPolicy>,
    /// What the engine does when this step exhausts its attempts.
    /// Falls back to the workflow default, then to abort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<FailurePolicy>,
}

fn default_threshold() -> f32 {
    defaults::MATCH_THRESHOLD
}

fn default_end_delay() -> f64 {
    defaults::END_DELAY_SECS
}

impl StepDefinition {
    pub fn start_delay(&self) -> Duration {
        secs(self.start_delay_secs)
    }

    pub fn end_delay(&self) -> Duration {
        secs(self.end_delay_secs)
    }
}

/// How often and how long a step keeps trying to match its template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before the step fails.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: f64,
    /// Wall-clock bound across all attempts, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
}

fn default_max_attempts() -> u32 {
    defaults::MAX_ATTEMPTS
}

fn default_retry_delay() -> f64 {
    defaults::RETRY_DELAY_SECS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay(),
            timeout_secs: None,
        }
    }
}

impl RetryPolicy {
    pub fn retry_delay(&self) -> Duration {
        secs(self.retry_delay_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(secs)
    }
}

/// Post-action verification: probe until the step's template is gone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerifyPolicy {
    /// Probes before verification gives up.
    #[serde(default = "default_verify_attempts")]
    pub attempts: u32,
    /// Pause between probes, in seconds.
    #[serde(default = "default_verify_delay")]
    pub delay_secs: f64,
}

fn default_verify_attempts() -> u32 {
    defaults::VERIFY_ATTEMPTS
}

fn default_verify_delay() -> f64 {
    defaults::VERIFY_DELAY_SECS
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            attempts: default_verify_attempts(),
            delay_secs: default_verify_delay(),
        }
    }
}

impl VerifyPolicy {
    pub fn delay(&self) -> Duration {
        secs(self.delay_secs)
    }
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

/// Declared reaction to a step failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Pretend the step succeeded and move on.
    SkipStep,
    /// Restart the innermost enclosing loop from its first unit.
    RestartLoop,
    /// Restart the workflow from its first unit.
    RestartWorkflow,
}

/// The engine's resolved reaction to a step failure.
///
/// Differs from [`FailurePolicy`] in that `RestartLoop` has been bound to a
/// concrete loop (the nearest enclosing one) by the time a decision exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Abort,
    SkipStep,
    RestartNearestLoop,
    RestartWorkflow,
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

/// Identity of a loop within one workflow definition.
///
/// Assigned sequentially by the loader; stable across flattening so plan
/// markers and jump targets can refer back to the definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopId(pub u32);

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What decides whether a loop runs another iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    /// Run the body exactly `iterations` times.
    Counted { iterations: u32 },
    /// Run the body until `template` is found at or above `threshold`.
    /// Bounded by the configured safety cap.
    Until { template: String, threshold: f32 },
}

/// A repeated sub-sequence of the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopDefinition {
    pub id: LoopId,
    pub kind: LoopKind,
    /// Pause between iterations, in seconds.
    #[serde(default)]
    pub iteration_delay_secs: f64,
    pub body: Vec<WorkflowItem>,
}

impl LoopDefinition {
    pub fn iteration_delay(&self) -> Duration {
        secs(self.iteration_delay_secs)
    }
}

// ---------------------------------------------------------------------------
// Workflow definition
// ---------------------------------------------------------------------------

/// One unit in a workflow body: a leaf step or a nested loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowItem {
    Step(StepDefinition),
    Loop(LoopDefinition),
}

/// A named, ordered tree of steps and loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    /// Default failure reaction for steps that do not declare their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<FailurePolicy>,
    #[serde(default)]
    pub items: Vec<WorkflowItem>,
}

impl WorkflowDefinition {
    /// Total number of steps, counting nested loop bodies.
    pub fn step_count(&self) -> usize {
        fn count(items: &[WorkflowItem]) -> usize {
            items
                .iter()
                .map(|item| match item {
                    WorkflowItem::Step(_) => 1,
                    WorkflowItem::Loop(l) => count(&l.body),
                })
                .sum()
        }
        count(&self.items)
    }

    /// Total number of loops, counting nested ones.
    pub fn loop_count(&self) -> usize {
        fn count(items: &[WorkflowItem]) -> usize {
            items
                .iter()
                .map(|item| match item {
                    WorkflowItem::Step(_) => 0,
                    WorkflowItem::Loop(l) => 1 + count(&l.body),
                })
                .sum()
        }
        count(&self.items)
    }
}

// ---------------------------------------------------------------------------
// Run mode & status
// ---------------------------------------------------------------------------

/// Whether the plan runs once or repeats until stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Once,
    Loop,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once => write!(f, "once"),
            Self::Loop => write!(f, "loop"),
        }
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    /// Whether the run has finished and will never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// Point-in-time snapshot of a run, readable from any thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    /// Plan index of the unit being executed, when running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_unit: Option<usize>,
}

impl RunStatus {
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            current_unit: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
