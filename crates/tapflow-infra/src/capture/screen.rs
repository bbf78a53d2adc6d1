//! Primary-monitor frame source (desktop feature).

use std::future::Future;
use std::pin::Pin;

use xcap::Monitor;

use tapflow_core::ports::FrameSource;
use tapflow_types::error::StepFailure;
use tapflow_types::frame::Frame;
use tapflow_types::geometry::{Calibration, Position, Region};

use super::window::rgba_image_to_frame;

/// Captures the primary monitor via xcap.
pub struct ScreenSource {
    scale: f64,
}

impl ScreenSource {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    fn grab(&self) -> Result<Frame, StepFailure> {
        let unavailable = |e: xcap::XCapError| StepFailure::CaptureUnavailable(e.to_string());
        let monitors = Monitor::all().map_err(unavailable)?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| monitors.first())
            .ok_or_else(|| StepFailure::CaptureUnavailable("no monitor found".to_string()))?;
        let image = monitor.capture_image().map_err(unavailable)?;
        rgba_image_to_frame(&image)
    }
}

impl FrameSource for ScreenSource {
    fn name(&self) -> &str {
        "screen"
    }

    fn capture<'a>(
        &'a self,
        region: Option<Region>,
    ) -> Pin<Box<dyn Future<Output = Result<Frame, StepFailure>> + Send + 'a>> {
        Box::pin(async move {
            // xcap capture is blocking platform API work.
            let frame = tokio::task::block_in_place(|| self.grab())?;
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
            size: None,
        }
    }
}
