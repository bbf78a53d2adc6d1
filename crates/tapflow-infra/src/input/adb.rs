//! ADB touch input backend.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use tapflow_core::ports::ActionBackend;
use tapflow_types::error::StepFailure;
use tapflow_types::geometry::Position;
use tapflow_types::workflow::ActionKind;

use crate::adb::{AdbClient, AdbError};

/// Spacing between the two taps of a double tap.
const DOUBLE_TAP_GAP: Duration = Duration::from_millis(100);

/// How long a long press (and its secondary-tap rendering) holds.
const LONG_PRESS_MS: u64 = 600;

/// Delivers actions as `adb shell input` invocations.
///
/// Touch has no cursor, so `MoveTo` is a no-op; a secondary tap renders as
/// a long press, the touch idiom for a context action.
pub struct AdbInput {
    client: AdbClient,
}

impl AdbInput {
    pub fn new(client: AdbClient) -> Self {
        Self { client }
    }

    async fn dispatch(&self, action: &ActionKind, position: Position) -> Result<(), AdbError> {
        let (x, y) = (position.x, position.y);
        match action {
            ActionKind::Tap => self.client.tap(x, y).await,
            ActionKind::DoubleTap => {
                self.client.tap(x, y).await?;
                tokio::time::sleep(DOUBLE_TAP_GAP).await;
                self.client.tap(x, y).await
            }
            ActionKind::SecondaryTap | ActionKind::LongPress => {
                self.client.long_press(x, y, LONG_PRESS_MS).await
            }
            ActionKind::MoveTo => {
                debug!(%position, "move_to is a no-op on touch input");
                Ok(())
            }
            ActionKind::Swipe {
                dx,
                dy,
                duration_ms,
            } => {
                self.client
                    .swipe((x, y), (x + dx, y + dy), *duration_ms)
                    .await
            }
        }
    }
}

impl ActionBackend for AdbInput {
    fn name(&self) -> &str {
        "adb"
    }

    fn prepare<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), StepFailure>> + Send + 'a>> {
        // Device input needs no foregrounding; taps land wherever the
        // device currently is.
        Box::pin(async move { Ok(()) })
    }

    fn perform<'a>(
        &'a self,
        action: &'a ActionKind,
        position: Position,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepFailure>> + Send + 'a>> {
        Box::pin(async move {
            self.dispatch(action, position)
                .await
                .map_err(|e| StepFailure::ActionFailed(e.to_string()))
        })
    }
}
