//! Template image loading and caching.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::ImageReader;
use tracing::debug;

use tapflow_types::error::StepFailure;
use tapflow_types::frame::Frame;

/// Loads template images from the templates directory, as grayscale frames,
/// caching each by its script-relative name.
///
/// Template sets are small and static for the lifetime of a run, so the
/// cache never evicts.
pub struct TemplateStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<Frame>>>,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The template named in a step (`chest.png`), loaded and cached.
    ///
    /// A missing or undecodable file is a [`StepFailure::TemplateUnavailable`];
    /// it consumes step attempts like any other collaborator failure.
    pub fn get(&self, name: &str) -> Result<Arc<Frame>, StepFailure> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(frame) = cache.get(name) {
                return Ok(frame.clone());
            }
        }

        let frame = Arc::new(self.load(name)?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(name.to_string(), frame.clone());
        }
        Ok(frame)
    }

    fn load(&self, name: &str) -> Result<Frame, StepFailure> {
        let path = self.resolve(name);
        debug!(template = name, path = %path.display(), "loading template");
        let unavailable =
            |detail: String| StepFailure::TemplateUnavailable(format!("{name}: {detail}"));

        let image = ImageReader::open(&path)
            .map_err(|e| unavailable(e.to_string()))?
            .decode()
            .map_err(|e| unavailable(e.to_string()))?
            .into_luma8();
        Frame::new(image.width(), image.height(), image.into_raw())
            .map_err(|e| unavailable(e.to_string()))
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
