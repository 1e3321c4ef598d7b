//! Pointer to fractional coordinate mapping.
//!
//! Pins store their position as a percentage of the rendered page surface so
//! that the same pin lands in the same place at any zoom or viewport size.
//! Pixel positions are only ever derived, against whatever surface is current.

use crate::error::{InspectError, InspectResult};
use serde::{Deserialize, Serialize};

pub const FRACTION_MAX: f64 = 100.0;

/// Origin and pixel dimensions of a rendered page surface at the moment of
/// the pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceBounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// A surface anchored at the origin.
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn contains(&self, pixel_x: f64, pixel_y: f64) -> bool {
        pixel_x >= self.left
            && pixel_x <= self.left + self.width
            && pixel_y >= self.top
            && pixel_y <= self.top + self.height
    }

    fn ensure_area(&self) -> InspectResult<()> {
        if self.width > 0.0 && self.height > 0.0 {
            Ok(())
        } else {
            Err(InspectError::DegenerateSurface { width: self.width, height: self.height })
        }
    }
}

/// Resolution-independent position, both axes in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractionalPoint {
    pub x: f64,
    pub y: f64,
}

impl FractionalPoint {
    /// Clamps both axes into `[0, 100]`. NaN collapses to 0.
    pub fn clamped(x: f64, y: f64) -> Self {
        Self { x: clamp_fraction(x), y: clamp_fraction(y) }
    }

    pub fn is_in_range(&self) -> bool {
        (0.0..=FRACTION_MAX).contains(&self.x) && (0.0..=FRACTION_MAX).contains(&self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, FRACTION_MAX)
}

/// Maps a pointer position to a fractional coordinate on `bounds`.
///
/// Clicks outside the surface are clamped to its nearest edge.
pub fn to_fractional(
    pointer_x: f64,
    pointer_y: f64,
    bounds: SurfaceBounds,
) -> InspectResult<FractionalPoint> {
    bounds.ensure_area()?;

    let x = (pointer_x - bounds.left) / bounds.width * FRACTION_MAX;
    let y = (pointer_y - bounds.top) / bounds.height * FRACTION_MAX;

    Ok(FractionalPoint::clamped(x, y))
}

/// Inverse of [`to_fractional`] for marker placement.
pub fn to_pixel(point: FractionalPoint, bounds: SurfaceBounds) -> PixelPoint {
    PixelPoint {
        x: bounds.left + point.x / FRACTION_MAX * bounds.width,
        y: bounds.top + point.y / FRACTION_MAX * bounds.height,
    }
}
