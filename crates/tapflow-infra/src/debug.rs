//! Debug frame dumps.
//!
//! When enabled, captured frames are saved as PNGs for offline inspection
//! of what the matcher actually saw. Purely a diagnostics sink; failures to
//! write are logged and swallowed so a full disk never fails a run.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use tracing::warn;

use tapflow_core::ports::FrameSource;
use tapflow_types::error::StepFailure;
use tapflow_types::frame::Frame;
use tapflow_types::geometry::{Calibration, Region};

/// Writes numbered, timestamped frame PNGs into a debug directory.
pub struct FrameDump {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FrameDump {
    /// Create the dump directory (and parents) if missing.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `frame` under `<seq>-<timestamp>-<label>.png`.
    ///
    /// Returns the written path; errors are reported in the log only.
    pub fn dump(&self, frame: &Frame, label: &str) -> Option<PathBuf> {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        let stamp = Local::now().format("%H%M%S%.3f");
        let path = self
            .dir
            .join(format!("{seq:04}-{stamp}-{}.png", sanitize(label)));

        let Some(image) =
            image::GrayImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        else {
            warn!(label, "frame buffer did not form an image");
            return None;
        };
        match image.save(&path) {
            Ok(()) => Some(path),
            Err(error) => {
                warn!(%error, path = %path.display(), "frame dump failed");
                None
            }
        }
    }
}

/// A frame source that saves every frame it hands out.
///
/// Wraps the real source when the run is started with frame dumping on;
/// the engine sees an ordinary source.
pub struct DumpingSource {
    inner: Arc<dyn FrameSource>,
    dump: FrameDump,
}

impl DumpingSource {
    pub fn new(inner: Arc<dyn FrameSource>, dump: FrameDump) -> Self {
        Self { inner, dump }
    }
}

impl FrameSource for DumpingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capture<'a>(
        &'a self,
        region: Option<Region>,
    ) -> Pin<Box<dyn Future<Output = Result<Frame, StepFailure>> + Send + 'a>> {
        Box::pin(async move {
            let frame = self.inner.capture(region).await?;
            let label = if region.is_some() { "roi" } else { "full" };
            self.dump.dump(&frame, label);
            Ok(frame)
        })
    }

    fn calibration(&self) -> Calibration {
        self.inner.calibration()
    }
}

/// Keep labels filesystem-safe.
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
