//! Grayscale normalized cross-correlation matcher.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::trace;

use tapflow_core::ports::TemplateMatcher;
use tapflow_types::error::StepFailure;
use tapflow_types::frame::Frame;
use tapflow_types::geometry::Position;
use tapflow_types::matching::MatchResult;

use super::store::TemplateStore;

/// Sweeps the template over the frame and scores each placement with
/// zero-mean normalized cross-correlation.
///
/// Scores land in `[-1, 1]`; negatives and placements against a
/// zero-variance patch clamp to 0 on the way into [`MatchResult`]. The
/// reported position is the center of the best placement, in frame
/// coordinates.
pub struct NccMatcher {
    store: Arc<TemplateStore>,
}

impl NccMatcher {
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self { store }
    }
}

impl TemplateMatcher for NccMatcher {
    fn find<'a>(
        &'a self,
        frame: &'a Frame,
        template: &'a str,
        threshold: f32,
    ) -> Pin<Box<dyn Future<Output = Result<MatchResult, StepFailure>> + Send + 'a>> {
        Box::pin(async move {
            let patch = self.store.get(template)?;
            let result = best_match(frame, &patch, threshold);
            trace!(template, threshold, ?result, "match swept");
            Ok(result)
        })
    }
}

/// Best placement of `patch` inside `frame`, or `NoMatch` when nothing
/// scores at or above `floor` (including a patch larger than the frame).
fn best_match(frame: &Frame, patch: &Frame, floor: f32) -> MatchResult {
    if patch.width() > frame.width() || patch.height() > frame.height() {
        return MatchResult::NoMatch;
    }

    let (tw, th) = (patch.width() as usize, patch.height() as usize);
    let pixels = (tw * th) as f64;

    // Template statistics are placement-invariant.
    let t_mean = mean(patch.data());
    let t_dev: Vec<f64> = patch.data().iter().map(|&p| p as f64 - t_mean).collect();
    let t_var: f64 = t_dev.iter().map(|d| d * d).sum();
    if t_var == 0.0 {
        // A flat template correlates with nothing.
        return MatchResult::NoMatch;
    }

    let mut best_score = f64::NEG_INFINITY;
    let mut best_at = (0usize, 0usize);

    for y in 0..=(frame.height() as usize - th) {
        for x in 0..=(frame.width() as usize - tw) {
            let score = ncc_at(frame, x, y, tw, th, &t_dev, t_var, pixels);
            if score > best_score {
                best_score = score;
                best_at = (x, y);
            }
        }
    }

    let confidence = best_score.max(0.0) as f32;
    if confidence >= floor {
        let center = Position::new(
            (best_at.0 + tw / 2) as i32,
            (best_at.1 + th / 2) as i32,
        );
        MatchResult::found(center, confidence)
    } else {
        MatchResult::NoMatch
    }
}

fn mean(data: &[u8]) -> f64 {
    data.iter().map(|&p| p as f64).sum::<f64>() / data.len() as f64
}

#[allow(clippy::too_many_arguments)]
fn ncc_at(
    frame: &Frame,
    x: usize,
    y: usize,
    tw: usize,
    th: usize,
    t_dev: &[f64],
    t_var: f64,
    pixels: f64,
) -> f64 {
    // Window mean first, then the correlation over the same window.
    let mut w_sum = 0.0;
    for row in 0..th {
        let line = &frame.row((y + row) as u32)[x..x + tw];
        w_sum += line.iter().map(|&p| p as f64).sum::<f64>();
    }
    let w_mean = w_sum / pixels;

    let mut numerator = 0.0;
    let mut w_var = 0.0;
    for row in 0..th {
        let line = &frame.row((y + row) as u32)[x..x + tw];
        let devs = &t_dev[row * tw..(row + 1) * tw];
        for (&p, &td) in line.iter().zip(devs) {
            let fd = p as f64 - w_mean;
            numerator += fd * td;
            w_var += fd * fd;
        }
    }

    if w_var == 0.0 {
        return 0.0;
    }
    numerator / (w_var * t_var).sqrt()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// A frame with a distinctive gradient patch pasted at `(px, py)`.
    fn frame_with_patch(
        width: u32,
        height: u32,
        px: usize,
        py: usize,
        patch: &Frame,
    ) -> Frame {
        let mut data = vec![64u8; (width * height) as usize];
        for y in 0..patch.height() as usize {
            for x in 0..patch.width() as usize {
                data[(py + y) * width as usize + px + x] = patch.row(y as u32)[x];
            }
        }
        Frame::new(width, height, data).unwrap()
    }

    /// A small patch with structure (diagonal gradient).
    fn gradient_patch(width: u32, height: u32) -> Frame {
        let data: Vec<u8> = (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x * 40 + y * 11) % 256) as u8))
            .collect();
        Frame::new(width, height, data).unwrap()
    }

    #[test]
    fn exact_patch_matches_at_its_center_with_full_confidence() {
        let patch = gradient_patch(6, 4);
        let frame = frame_with_patch(40, 30, 17, 9, &patch);

        let result = best_match(&frame, &patch, 0.9);
        match result {
            MatchResult::Found {
                position,
                confidence,
            } => {
                assert_eq!(position, Position::new(17 + 3, 9 + 2));
                assert!(confidence > 0.99);
            }
            MatchResult::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn absent_patch_reports_no_match() {
        let patch = gradient_patch(6, 4);
        let frame = Frame::new(40, 30, vec![64u8; 1200]).unwrap();
        assert_eq!(best_match(&frame, &patch, 0.7), MatchResult::NoMatch);
    }

    #[test]
    fn below_floor_best_is_no_match() {
        let patch = gradient_patch(6, 4);
        let frame = frame_with_patch(40, 30, 17, 9, &patch);
        // A floor above a perfect score suppresses even the exact placement.
        let result = best_match(&frame, &patch, 1.1);
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn patch_larger_than_frame_is_no_match() {
        let patch = gradient_patch(50, 40);
        let frame = Frame::new(10, 10, vec![0u8; 100]).unwrap();
        assert_eq!(best_match(&frame, &patch, 0.0), MatchResult::NoMatch);
    }

    #[test]
    fn flat_template_never_matches() {
        let patch = Frame::new(4, 4, vec![128u8; 16]).unwrap();
        let frame = Frame::new(20, 20, vec![128u8; 400]).unwrap();
        assert_eq!(best_match(&frame, &patch, 0.0), MatchResult::NoMatch);
    }

    #[test]
    fn patch_at_the_frame_edge_is_found() {
        let patch = gradient_patch(5, 5);
        let frame = frame_with_patch(20, 20, 15, 15, &patch);
        let result = best_match(&frame, &patch, 0.9);
        assert!(matches!(
            result,
            MatchResult::Found { position, .. } if position == Position::new(17, 17)
        ));
    }

    #[tokio::test]
    async fn matcher_resolves_templates_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let patch = gradient_patch(6, 4);
        let image = image::GrayImage::from_raw(6, 4, patch.data().to_vec()).unwrap();
        image.save(dir.path().join("target.png")).unwrap();

        let matcher = NccMatcher::new(Arc::new(TemplateStore::new(dir.path())));
        let frame = frame_with_patch(40, 30, 10, 10, &patch);

        let result = matcher.find(&frame, "target.png", 0.9).await.unwrap();
        assert!(result.is_found());

        let missing = matcher.find(&frame, "missing.png", 0.9).await;
        assert!(matches!(
            missing,
            Err(StepFailure::TemplateUnavailable(_))
        ));
    }
}
