//! Desktop mouse backend (desktop feature).
//!
//! Drives the system cursor through enigo. Enigo's platform handles are not
//! `Send`, so each action runs on a blocking thread with a fresh handle
//! instead of sharing one across the worker task.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

use tapflow_core::ports::ActionBackend;
use tapflow_types::error::StepFailure;
use tapflow_types::geometry::Position;
use tapflow_types::workflow::ActionKind;

/// Spacing between the two clicks of a double click.
const DOUBLE_CLICK_GAP: Duration = Duration::from_millis(80);

/// How long a long press holds the button down.
const LONG_PRESS: Duration = Duration::from_millis(600);

/// Steps a swipe is interpolated over.
const SWIPE_STEPS: i32 = 20;

/// Clicks and drags with the desktop mouse.
pub struct MouseInput;

impl MouseInput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MouseInput {
    fn default() -> Self {
        Self::new()
    }
}

fn action_failed(e: impl std::fmt::Display) -> StepFailure {
    StepFailure::ActionFailed(e.to_string())
}

/// Perform one action synchronously; runs on a blocking thread.
fn dispatch(action: &ActionKind, position: Position) -> Result<(), StepFailure> {
    let mut enigo = Enigo::new(&Settings::default()).map_err(action_failed)?;
    enigo
        .move_mouse(position.x, position.y, Coordinate::Abs)
        .map_err(action_failed)?;

    match action {
        ActionKind::MoveTo => {}
        ActionKind::Tap => {
            enigo
                .button(Button::Left, Direction::Click)
                .map_err(action_failed)?;
        }
        ActionKind::DoubleTap => {
            enigo
                .button(Button::Left, Direction::Click)
                .map_err(action_failed)?;
            std::thread::sleep(DOUBLE_CLICK_GAP);
            enigo
                .button(Button::Left, Direction::Click)
                .map_err(action_failed)?;
        }
        ActionKind::SecondaryTap => {
            enigo
                .button(Button::Right, Direction::Click)
                .map_err(action_failed)?;
        }
        ActionKind::LongPress => {
            enigo
                .button(Button::Left, Direction::Press)
                .map_err(action_failed)?;
            std::thread::sleep(LONG_PRESS);
            enigo
                .button(Button::Left, Direction::Release)
                .map_err(action_failed)?;
        }
        ActionKind::Swipe {
            dx,
            dy,
            duration_ms,
        } => {
            enigo
                .button(Button::Left, Direction::Press)
                .map_err(action_failed)?;
            let pause = Duration::from_millis(duration_ms / SWIPE_STEPS as u64);
            for step in 1..=SWIPE_STEPS {
                let x = position.x + dx * step / SWIPE_STEPS;
                let y = position.y + dy * step / SWIPE_STEPS;
                enigo
                    .move_mouse(x, y, Coordinate::Abs)
                    .map_err(action_failed)?;
                std::thread::sleep(pause);
            }
            enigo
                .button(Button::Left, Direction::Release)
                .map_err(action_failed)?;
        }
    }
    Ok(())
}

impl ActionBackend for MouseInput {
    fn name(&self) -> &str {
        "mouse"
    }

    fn prepare<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), StepFailure>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }

    fn perform<'a>(
        &'a self,
        action: &'a ActionKind,
        position: Position,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepFailure>> + Send + 'a>> {
        let action = action.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || dispatch(&action, position))
                .await
                .map_err(|e| StepFailure::ActionFailed(format!("input thread failed: {e}")))?
        })
    }
}
