//! Single-window frame source (desktop feature).
//!
//! Captures one window located by a title substring. The window's placement
//! feeds the calibration origin so matches inside the window land on the
//! right desktop coordinates; the rect is refreshed at most every
//! [`WINDOW_REFRESH_INTERVAL`] so a moved window is picked up without
//! re-enumerating windows on every capture.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Instant;

use xcap::Window;

use tapflow_core::ports::FrameSource;
use tapflow_types::defaults::WINDOW_REFRESH_INTERVAL;
use tapflow_types::error::StepFailure;
use tapflow_types::frame::Frame;
use tapflow_types::geometry::{Calibration, Position, Region};

/// Convert an xcap RGBA capture into the engine's grayscale frame.
pub(super) fn rgba_image_to_frame(image: &image::RgbaImage) -> Result<Frame, StepFailure> {
    let gray: Vec<u8> = image
        .pixels()
        .map(|p| {
            let [r, g, b, _] = p.0;
            ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
        })
        .collect();
    Frame::new(image.width(), image.height(), gray)
        .map_err(|e| StepFailure::CaptureUnavailable(e.to_string()))
}

#[derive(Debug, Clone, Copy)]
struct WindowRect {
    origin: Position,
    size: (u32, u32),
}

/// Captures a window matched by title substring.
pub struct WindowSource {
    title: String,
    scale: f64,
    rect: Mutex<Option<(WindowRect, Instant)>>,
}

impl WindowSource {
    pub fn new(title: impl Into<String>, scale: f64) -> Self {
        Self {
            title: title.into(),
            scale,
            rect: Mutex::new(None),
        }
    }

    fn locate(&self) -> Result<Window, StepFailure> {
        let unavailable = |e: xcap::XCapError| StepFailure::CaptureUnavailable(e.to_string());
        Window::all()
            .map_err(unavailable)?
            .into_iter()
            .find(|w| {
                w.title()
                    .map(|title| title.contains(&self.title))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                StepFailure::CaptureUnavailable(format!("no window titled *{}*", self.title))
            })
    }

    fn grab(&self) -> Result<Frame, StepFailure> {
        let unavailable = |e: xcap::XCapError| StepFailure::CaptureUnavailable(e.to_string());
        let window = self.locate()?;

        let rect = WindowRect {
            origin: Position::new(
                window.x().map_err(unavailable)?,
                window.y().map_err(unavailable)?,
            ),
            size: (
                window.width().map_err(unavailable)?,
                window.height().map_err(unavailable)?,
            ),
        };
        if let Ok(mut cached) = self.rect.lock() {
            *cached = Some((rect, Instant::now()));
        }

        let image = window.capture_image().map_err(unavailable)?;
        rgba_image_to_frame(&image)
    }

    fn cached_rect(&self) -> Option<WindowRect> {
        let cached = self.rect.lock().ok()?;
        let (rect, refreshed) = (*cached)?;
        (refreshed.elapsed() < WINDOW_REFRESH_INTERVAL).then_some(rect)
    }
}

impl FrameSource for WindowSource {
    fn name(&self) -> &str {
        "window"
    }

    fn capture<'a>(
        &'a self,
        region: Option<Region>,
    ) -> Pin<Box<dyn Future<Output = Result<Frame, StepFailure>> + Send + 'a>> {
        Box::pin(async move {
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
        // Fall back to a stale rect rather than blocking: the next capture
        // refreshes it anyway.
        let rect = self
            .cached_rect()
            .or_else(|| self.rect.lock().ok().and_then(|cached| cached.map(|(r, _)| r)));
        match rect {
            Some(rect) => Calibration {
                origin: rect.origin,
                scale: self.scale,
                size: Some(rect.size),
            },
            None => Calibration {
                origin: Position::new(0, 0),
                scale: self.scale,
                size: None,
            },
        }
    }
}
