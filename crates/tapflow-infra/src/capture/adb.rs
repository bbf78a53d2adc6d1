//! ADB-backed frame source.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tracing::trace;

use tapflow_core::ports::FrameSource;
use tapflow_types::error::StepFailure;
use tapflow_types::frame::Frame;
use tapflow_types::geometry::{Calibration, Position, Region};

use crate::adb::AdbClient;

/// Captures device frames through `adb exec-out screencap`.
///
/// Regions are cropped locally out of the full device frame; the device
/// always ships the whole screen. The calibration origin is fixed at (0,0)
/// since device frames and device taps share a coordinate space; `scale`
/// comes from configuration for setups that resize the stream.
pub struct AdbFrameSource {
    client: AdbClient,
    scale: f64,
    /// Device frame size observed on the last capture, for calibration.
    size: Mutex<Option<(u32, u32)>>,
}

impl AdbFrameSource {
    pub fn new(client: AdbClient, scale: f64) -> Self {
        Self {
            client,
            scale,
            size: Mutex::new(None),
        }
    }
}

impl FrameSource for AdbFrameSource {
    fn name(&self) -> &str {
        "adb"
    }

    fn capture<'a>(
        &'a self,
        region: Option<Region>,
    ) -> Pin<Box<dyn Future<Output = Result<Frame, StepFailure>> + Send + 'a>> {
        Box::pin(async move {
            let frame = self
                .client
                .screencap()
                .await
                .map_err(|e| StepFailure::CaptureUnavailable(e.to_string()))?;
            trace!(width = frame.width(), height = frame.height(), "adb frame captured");
            if let Ok(mut size) = self.size.lock() {
                *size = Some((frame.width(), frame.height()));
            }
            match region {
                Some(region) => frame
                    .crop(region)
                    .map_err(|e| StepFailure::CaptureUnavailable(e.to_string())),
                None => Ok(frame),
            }
        })
    }

    fn calibration(&self) -> Calibration {
        Calibration {
            origin: Position::new(0, 0),
            scale: self.scale,
            size: self.size.lock().ok().and_then(|size| *size),
        }
    }
}
