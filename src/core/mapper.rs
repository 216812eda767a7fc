//! Linear mapping between data units and integer pixel indices.
//!
//! Every axis, cursor and zoom calculation in the crate goes through these
//! functions. The free functions are stateless; [`AxisMapper`] precomputes the
//! coefficients once so per-point loops avoid a division per sample.

use serde::{Deserialize, Serialize};

use crate::core::types::CoordinateRange;

/// Distance beyond the pixel range that unclamped mapping may reach.
///
/// Polyline points just off-screen must keep their true direction so the
/// boundary segment is drawn with the right slope, but far-away points only
/// need to stay outside the clip area.
pub const PIXEL_GUARD_BAND: i32 = 1 << 15;

/// Orientation of a unit-to-pixel mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapDirection {
    /// Pixel index increases with the unit value (horizontal axes).
    Proportional,
    /// Pixel index decreases as the unit value increases (screen-Y axes).
    Inverse,
}

impl MapDirection {
    #[must_use]
    pub fn from_proportional(proportional: bool) -> Self {
        if proportional {
            Self::Proportional
        } else {
            Self::Inverse
        }
    }
}

/// Maps a unit value to a pixel index clamped to `[pixel_min, pixel_max]`.
///
/// A degenerate unit range and non-finite values map to the pixel that
/// represents `unit_min`.
#[must_use]
pub fn unit_to_pixel(
    direction: MapDirection,
    value: f64,
    pixel_min: i32,
    pixel_max: i32,
    unit_min: f64,
    unit_max: f64,
) -> i32 {
    let (lo, hi) = ordered(pixel_min, pixel_max);
    let origin = match direction {
        MapDirection::Proportional => lo,
        MapDirection::Inverse => hi,
    };
    let unit_span = unit_max - unit_min;
    if !value.is_finite() || !unit_span.is_finite() || unit_span <= 0.0 {
        return origin;
    }

    let offset = (value - unit_min) / unit_span * f64::from(hi - lo);
    let raw = match direction {
        MapDirection::Proportional => f64::from(lo) + offset,
        MapDirection::Inverse => f64::from(hi) - offset,
    };
    clamp_to_i32(raw.round(), lo, hi)
}

/// Maps a pixel index back to a unit value.
///
/// Pixels outside the range extrapolate linearly. A degenerate pixel or unit
/// range maps every pixel to `unit_min`.
#[must_use]
pub fn pixel_to_unit(
    direction: MapDirection,
    pixel: f64,
    pixel_min: i32,
    pixel_max: i32,
    unit_min: f64,
    unit_max: f64,
) -> f64 {
    let (lo, hi) = ordered(pixel_min, pixel_max);
    let pixel_span = f64::from(hi - lo);
    if pixel_span <= 0.0 || !pixel.is_finite() {
        return unit_min;
    }
    let fraction = match direction {
        MapDirection::Proportional => (pixel - f64::from(lo)) / pixel_span,
        MapDirection::Inverse => (f64::from(hi) - pixel) / pixel_span,
    };
    unit_min + fraction * (unit_max - unit_min)
}

/// Precomputed `pixel = slope * unit + intercept` mapping for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapper {
    direction: MapDirection,
    pixel_min: i32,
    pixel_max: i32,
    units: CoordinateRange,
    slope: f64,
    intercept: f64,
}

impl AxisMapper {
    #[must_use]
    pub fn new(
        direction: MapDirection,
        pixel_min: i32,
        pixel_max: i32,
        units: CoordinateRange,
    ) -> Self {
        let (lo, hi) = ordered(pixel_min, pixel_max);
        let unit_span = units.span();
        let scale = if unit_span > 0.0 {
            f64::from(hi - lo) / unit_span
        } else {
            0.0
        };
        let (slope, intercept) = match direction {
            MapDirection::Proportional => (scale, f64::from(lo) - units.min * scale),
            MapDirection::Inverse => (-scale, f64::from(hi) + units.min * scale),
        };
        Self {
            direction,
            pixel_min: lo,
            pixel_max: hi,
            units,
            slope,
            intercept,
        }
    }

    /// Mapper for a horizontal axis spanning `width` pixels.
    #[must_use]
    pub fn horizontal(width: u32, units: CoordinateRange) -> Self {
        Self::new(MapDirection::Proportional, 0, last_pixel(width), units)
    }

    /// Mapper for a vertical screen axis spanning `height` pixels.
    #[must_use]
    pub fn vertical(height: u32, units: CoordinateRange) -> Self {
        Self::new(MapDirection::Inverse, 0, last_pixel(height), units)
    }

    #[must_use]
    pub fn direction(&self) -> MapDirection {
        self.direction
    }

    #[must_use]
    pub fn units(&self) -> CoordinateRange {
        self.units
    }

    #[must_use]
    pub fn pixel_bounds(&self) -> (i32, i32) {
        (self.pixel_min, self.pixel_max)
    }

    /// Unrounded pixel coordinate.
    #[inline]
    #[must_use]
    pub fn to_pixel_f64(&self, value: f64) -> f64 {
        if self.slope == 0.0 || !value.is_finite() {
            return self.origin_pixel();
        }
        self.slope * value + self.intercept
    }

    /// Pixel index clamped to the mapper's pixel range.
    #[inline]
    #[must_use]
    pub fn to_pixel(&self, value: f64) -> i32 {
        clamp_to_i32(self.to_pixel_f64(value).round(), self.pixel_min, self.pixel_max)
    }

    /// Pixel index allowed to leave the pixel range by up to [`PIXEL_GUARD_BAND`].
    #[inline]
    #[must_use]
    pub fn to_pixel_unclamped(&self, value: f64) -> i32 {
        clamp_to_i32(
            self.to_pixel_f64(value).round(),
            self.pixel_min.saturating_sub(PIXEL_GUARD_BAND),
            self.pixel_max.saturating_add(PIXEL_GUARD_BAND),
        )
    }

    #[inline]
    #[must_use]
    pub fn to_unit(&self, pixel: f64) -> f64 {
        if self.slope == 0.0 || !pixel.is_finite() {
            return self.units.min;
        }
        (pixel - self.intercept) / self.slope
    }

    fn origin_pixel(&self) -> f64 {
        match self.direction {
            MapDirection::Proportional => f64::from(self.pixel_min),
            MapDirection::Inverse => f64::from(self.pixel_max),
        }
    }
}

fn last_pixel(extent: u32) -> i32 {
    i32::try_from(extent.max(1) - 1).unwrap_or(i32::MAX)
}

fn ordered(a: i32, b: i32) -> (i32, i32) {
    if a <= b { (a, b) } else { (b, a) }
}

fn clamp_to_i32(value: f64, lo: i32, hi: i32) -> i32 {
    if value.is_nan() {
        return lo;
    }
    // `as` saturates, and the clamp keeps the result inside the requested band.
    (value as i32).clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::{AxisMapper, MapDirection, pixel_to_unit, unit_to_pixel};
    use crate::core::CoordinateRange;

    #[test]
    fn maps_midrange_values_in_both_directions() {
        assert_eq!(
            unit_to_pixel(MapDirection::Proportional, 50.0, 0, 100, 0.0, 200.0),
            25
        );
        assert_eq!(
            unit_to_pixel(MapDirection::Inverse, 50.0, 0, 100, 0.0, 200.0),
            75
        );
    }

    #[test]
    fn degenerate_unit_range_maps_to_unit_min_pixel() {
        assert_eq!(
            unit_to_pixel(MapDirection::Proportional, 3.0, 10, 90, 5.0, 5.0),
            10
        );
        assert_eq!(
            unit_to_pixel(MapDirection::Inverse, 3.0, 10, 90, 5.0, 5.0),
            90
        );
        assert_eq!(
            pixel_to_unit(MapDirection::Proportional, 40.0, 10, 10, 5.0, 9.0),
            5.0
        );
    }

    #[test]
    fn output_is_clamped_to_pixel_range() {
        assert_eq!(
            unit_to_pixel(MapDirection::Proportional, 1e12, 0, 100, 0.0, 1.0),
            100
        );
        assert_eq!(
            unit_to_pixel(MapDirection::Proportional, f64::NAN, 0, 100, 0.0, 1.0),
            0
        );
    }

    #[test]
    fn stateful_mapper_tracks_free_function() {
        let units = CoordinateRange::new(-3.0, 17.0).expect("range");
        let mapper = AxisMapper::new(MapDirection::Inverse, 0, 479, units);
        for step in 0..=200 {
            let value = -3.0 + f64::from(step) * 0.1;
            let expected = unit_to_pixel(MapDirection::Inverse, value, 0, 479, -3.0, 17.0);
            // Half-pixel ties may round apart by one ulp of the coefficients.
            assert!((mapper.to_pixel(value) - expected).abs() <= 1);
        }
    }

    #[test]
    fn unclamped_mapping_reaches_past_the_edges() {
        let units = CoordinateRange::new(0.0, 10.0).expect("range");
        let mapper = AxisMapper::horizontal(101, units);
        assert_eq!(mapper.to_pixel_unclamped(-1.0), -10);
        assert_eq!(mapper.to_pixel_unclamped(11.0), 110);
        assert_eq!(mapper.to_pixel(11.0), 100);
    }
}
