//! Template match outcome.

use serde::{Deserialize, Serialize};

use crate::geometry::Position;

/// The outcome of looking for a template in a frame.
///
/// Absence is an explicit variant so callers must handle it; there is no
/// position to misuse when nothing matched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchResult {
    /// Best match at `position` (center of the matched area) with a
    /// normalized confidence in `[0, 1]`.
    Found { position: Position, confidence: f32 },
    /// Nothing in the frame scored at or above the acceptance floor.
    NoMatch,
}

impl MatchResult {
    /// A `Found` result with the confidence clamped into `[0, 1]`.
    /// Non-finite scores (a zero-variance patch can produce one) clamp to 0.
    pub fn found(position: Position, confidence: f32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self::Found {
            position,
            confidence,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Whether this is a `Found` at or above `threshold`.
    pub fn passes(&self, threshold: f32) -> bool {
        match self {
            Self::Found { confidence, .. } => *confidence >= threshold,
            Self::NoMatch => false,
        }
    }
}
