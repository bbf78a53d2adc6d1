//! Geometric value types shared by capture, matching, and input.
//!
//! `Position` is a point in whichever coordinate space the surrounding code
//! works in (frame space or action space); the coordinate transform in the
//! engine is the only place that moves between spaces.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors from constructing geometric values.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("region width must be positive, got {0}")]
    InvalidWidth(i32),

    #[error("region height must be positive, got {0}")]
    InvalidHeight(i32),
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// An immutable 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// A new position displaced by `(dx, dy)`. Does not mutate `self`.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A rectangular area, typically a capture region of interest.
///
/// Construction is validated: width and height must be positive. Fields are
/// read via accessors so an invalid rectangle can never be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self, GeometryError> {
        if width <= 0 {
            return Err(GeometryError::InvalidWidth(width));
        }
        if height <= 0 {
            return Err(GeometryError::InvalidHeight(height));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// The top-left corner.
    pub fn origin(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// First x coordinate past the right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// First y coordinate past the bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RegionHelper {
            x: i32,
            y: i32,
            width: i32,
            height: i32,
        }

        let helper = RegionHelper::deserialize(deserializer)?;
        Region::new(helper.x, helper.y, helper.width, helper.height)
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Calibration & target geometry
// ---------------------------------------------------------------------------

/// How a frame source's pixel space maps onto its action space.
///
/// `origin` is where the captured area starts in action coordinates (a window
/// source reports its top-left corner, full-screen and device sources report
/// zero). `scale` converts captured pixels to action units. `size` is the
/// full capture target in capture pixels when the source knows it; axis
/// scaling toward a differing [`TargetGeometry`] needs it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub origin: Position,
    pub scale: f64,
    pub size: Option<(u32, u32)>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            origin: Position::new(0, 0),
            scale: 1.0,
            size: None,
        }
    }
}

/// Logical geometry of the destination device, when it differs from the
/// captured frame (e.g. a scaled-down device stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGeometry {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub orientation: Orientation,
}

/// Screen orientation of the destination device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
