//! Match-space to action-space coordinate mapping.
//!
//! Matching happens in capture pixels, possibly inside a cropped region;
//! actions happen in the backend's absolute coordinates. This is the one
//! place that moves between those spaces.

use tapflow_types::geometry::{Calibration, Orientation, Position, Region, TargetGeometry};

/// Map a match position to an absolute action-space coordinate.
///
/// The affine part is `(match_pos + region_origin + step_offset) * scale +
/// origin`. When a [`TargetGeometry`] is configured the result is then
/// corrected for the destination device: a landscape target swaps the axes,
/// and when the calibration knows the full capture size each axis is rescaled
/// onto the target's logical resolution.
///
/// Pure function. With an identity calibration, no offset, no region, and no
/// target, the input comes back unchanged.
pub fn to_action_space(
    match_pos: Position,
    step_offset: Option<Position>,
    region: Option<Region>,
    calibration: Calibration,
    target: Option<TargetGeometry>,
) -> Position {
    let offset = step_offset.unwrap_or_else(|| Position::new(0, 0));
    let region_origin = region
        .map(|r| r.origin())
        .unwrap_or_else(|| Position::new(0, 0));

    let mut x = (match_pos.x + region_origin.x + offset.x) as f64 * calibration.scale
        + calibration.origin.x as f64;
    let mut y = (match_pos.y + region_origin.y + offset.y) as f64 * calibration.scale
        + calibration.origin.y as f64;

    if let Some(target) = target {
        if target.orientation == Orientation::Landscape {
            std::mem::swap(&mut x, &mut y);
        }
        if let Some((cap_w, cap_h)) = calibration.size {
            // Orient the capture dimensions the same way as the target
            // before comparing the two resolutions.
            let (cap_w, cap_h) = match target.orientation {
                Orientation::Portrait => (cap_w as f64, cap_h as f64),
                Orientation::Landscape => (cap_h as f64, cap_w as f64),
            };
            if cap_w > 0.0 && cap_h > 0.0 {
                x = x * target.width as f64 / cap_w;
                y = y * target.height as f64 / cap_h;
            }
        }
    }

    Position::new(x.round() as i32, y.round() as i32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
