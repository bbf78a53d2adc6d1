//! Collaborator port definitions.
//!
//! The engine drives three collaborators: a frame source (where pixels come
//! from), a template matcher (where a template sits in a frame), and an
//! action backend (how to act at a position). Implementations live in
//! tapflow-infra; the engine only ever sees these traits.
//!
//! All three are object-safe with boxed futures so backends can be selected
//! at runtime and shared as `Arc<dyn ...>` across the worker task.

use std::future::Future;
use std::pin::Pin;

use tapflow_types::error::StepFailure;
use tapflow_types::frame::Frame;
use tapflow_types::geometry::{Calibration, Position, Region};
use tapflow_types::matching::MatchResult;
use tapflow_types::workflow::ActionKind;

/// Produces frames of the capture target.
///
/// A source captures either the full target or a sub-region of it. The
/// returned frame is in capture space; [`FrameSource::calibration`] describes
/// how that space maps onto the action space the backend taps in.
pub trait FrameSource: Send + Sync {
    /// Short backend name for logs (e.g. "adb", "screen", "window").
    fn name(&self) -> &str;

    /// Capture a frame, cropped to `region` when given.
    ///
    /// Sources that track a movable target (a window) refresh its placement
    /// as part of capturing. Errors are reported as
    /// [`StepFailure::CaptureUnavailable`] and consume a retry attempt.
    fn capture<'a>(
        &'a self,
        region: Option<Region>,
    ) -> Pin<Box<dyn Future<Output = Result<Frame, StepFailure>> + Send + 'a>>;

    /// Current capture-space to action-space mapping.
    fn calibration(&self) -> Calibration;
}

/// Locates a named template inside a frame.
pub trait TemplateMatcher: Send + Sync {
    /// Search `frame` for `template`, using `threshold` as the acceptance
    /// floor. A best candidate below the floor is reported as
    /// [`MatchResult::NoMatch`], never as an error; errors are reserved for
    /// a template that cannot be loaded at all.
    fn find<'a>(
        &'a self,
        frame: &'a Frame,
        template: &'a str,
        threshold: f32,
    ) -> Pin<Box<dyn Future<Output = Result<MatchResult, StepFailure>> + Send + 'a>>;
}

/// Delivers input actions at absolute action-space coordinates.
pub trait ActionBackend: Send + Sync {
    /// Short backend name for logs (e.g. "adb", "mouse").
    fn name(&self) -> &str;

    /// Called once before each action so the backend can ready its target
    /// (e.g. bring a window to the foreground). Backends with nothing to
    /// ready return `Ok(())`.
    fn prepare<'a>(&'a self)
    -> Pin<Box<dyn Future<Output = Result<(), StepFailure>> + Send + 'a>>;

    /// Perform `action` at `position`.
    fn perform<'a>(
        &'a self,
        action: &'a ActionKind,
        position: Position,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepFailure>> + Send + 'a>>;
}
