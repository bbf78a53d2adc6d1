//! Captured frame raster.
//!
//! `Frame` is the single pixel format the capture and matching contracts
//! exchange: 8-bit grayscale, row-major. Capture backends convert whatever
//! their source produces (BGRA screenshots, raw device buffers) into this
//! before handing it to the engine.

use std::fmt;

use thiserror::Error;

use crate::geometry::Region;

/// Errors from constructing or slicing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    BufferMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("crop region {region} exceeds the {width}x{height} frame")]
    CropOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },
}

/// An owned 8-bit grayscale raster.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a row-major grayscale buffer. Fails unless `data` holds exactly
    /// `width * height` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(FrameError::BufferMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One row of pixels. Panics if `y` is out of range; callers iterate
    /// `0..height()`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.width as usize;
        &self.data[start..start + self.width as usize]
    }

    /// Copy out the sub-raster covered by `region`, which must lie fully
    /// inside the frame.
    pub fn crop(&self, region: Region) -> Result<Self, FrameError> {
        let out_of_bounds = region.x() < 0
            || region.y() < 0
            || region.right() as i64 > self.width as i64
            || region.bottom() as i64 > self.height as i64;
        if out_of_bounds {
            return Err(FrameError::CropOutOfBounds {
                region,
                width: self.width,
                height: self.height,
            });
        }

        let width = region.width() as usize;
        let mut data = Vec::with_capacity(width * region.height() as usize);
        for y in region.y()..region.bottom() {
            let row = self.row(y as u32);
            let start = region.x() as usize;
            data.extend_from_slice(&row[start..start + width]);
        }
        Ok(Self {
            width: region.width() as u32,
            height: region.height() as u32,
            data,
        })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
