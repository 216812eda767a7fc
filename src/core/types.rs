use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};

/// Pixel size of a plot area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Largest accepted width or height.
    pub const MAX_DIMENSION: u32 = 1 << 15;

    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns a viewport with both dimensions raised to at least one pixel.
    ///
    /// Host layouts routinely report zero-sized areas while a window is being
    /// built or collapsed; those transients are clamped instead of rejected.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            width: self.width.max(1),
            height: self.height.max(1),
        }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        (1..=Self::MAX_DIMENSION).contains(&self.width)
            && (1..=Self::MAX_DIMENSION).contains(&self.height)
    }

    /// Clamps zero dimensions and rejects ones no surface can be allocated for.
    pub fn checked(self) -> PlotResult<Self> {
        let clamped = self.clamped();
        if !clamped.is_valid() {
            return Err(PlotError::InvalidViewport {
                width: self.width,
                height: self.height,
            });
        }
        Ok(clamped)
    }
}

/// Plot axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
        }
    }
}

/// Closed interval of data units along one axis.
///
/// Deserialisation goes through [`CoordinateRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RangeBounds")]
pub struct CoordinateRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Deserialize)]
struct RangeBounds {
    min: f64,
    max: f64,
}

impl TryFrom<RangeBounds> for CoordinateRange {
    type Error = PlotError;

    fn try_from(bounds: RangeBounds) -> Result<Self, Self::Error> {
        Self::new(bounds.min, bounds.max)
    }
}

impl CoordinateRange {
    /// Creates a range, rejecting non-finite bounds and `min > max`.
    ///
    /// Reversed bounds are never swapped silently.
    pub fn new(min: f64, max: f64) -> PlotResult<Self> {
        Self::for_axis(Axis::X, min, max)
    }

    pub(crate) fn for_axis(axis: Axis, min: f64, max: f64) -> PlotResult<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(PlotError::InvalidRange {
                axis: axis.name(),
                min,
                max,
            });
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub fn span(self) -> f64 {
        self.max - self.min
    }

    #[must_use]
    pub fn center(self) -> f64 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn is_degenerate(self) -> bool {
        self.span() <= 0.0
    }

    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Intersects this range with `limits`.
    ///
    /// A range lying entirely outside the limits collapses onto the nearest
    /// limit edge.
    #[must_use]
    pub fn clamp_to(self, limits: Self) -> Self {
        let min = self.min.clamp(limits.min, limits.max);
        let max = self.max.clamp(limits.min, limits.max);
        Self { min, max }
    }

    /// Moves this range inside `limits` keeping its span where possible.
    #[must_use]
    pub fn shift_into(self, limits: Self) -> Self {
        let span = self.span().min(limits.span());
        let upper = (limits.max - span).max(limits.min);
        let min = self.min.clamp(limits.min, upper);
        Self {
            min,
            max: min + span,
        }
    }

    /// Moves each bound `fraction` of the way toward `target`.
    #[must_use]
    pub fn approach(self, target: Self, fraction: f64) -> Self {
        Self {
            min: self.min + (target.min - self.min) * fraction,
            max: self.max + (target.max - self.max) * fraction,
        }
    }

    #[must_use]
    pub fn approx_eq(self, other: Self, epsilon: f64) -> bool {
        (self.min - other.min).abs() <= epsilon && (self.max - other.max).abs() <= epsilon
    }
}

/// Pair of visible ranges forming one level of zoom history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomFrame {
    pub x: CoordinateRange,
    pub y: CoordinateRange,
}

impl ZoomFrame {
    #[must_use]
    pub fn new(x: CoordinateRange, y: CoordinateRange) -> Self {
        Self { x, y }
    }

    /// Builds a frame from raw bounds, validating both axes.
    pub fn from_bounds(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> PlotResult<Self> {
        Ok(Self {
            x: CoordinateRange::for_axis(Axis::X, x_min, x_max)?,
            y: CoordinateRange::for_axis(Axis::Y, y_min, y_max)?,
        })
    }

    #[must_use]
    pub fn range(self, axis: Axis) -> CoordinateRange {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    pub fn set_range(&mut self, axis: Axis, range: CoordinateRange) {
        match axis {
            Axis::X => self.x = range,
            Axis::Y => self.y = range,
        }
    }

    #[must_use]
    pub fn clamp_to(self, limits: Self) -> Self {
        Self {
            x: self.x.clamp_to(limits.x),
            y: self.y.clamp_to(limits.y),
        }
    }

    #[must_use]
    pub fn approach(self, target: Self, fraction: f64) -> Self {
        Self {
            x: self.x.approach(target.x, fraction),
            y: self.y.approach(target.y, fraction),
        }
    }

    #[must_use]
    pub fn approx_eq(self, other: Self, epsilon: f64) -> bool {
        self.x.approx_eq(other.x, epsilon) && self.y.approx_eq(other.y, epsilon)
    }
}

/// Integer pixel rectangle, `x`/`y` at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn from_viewport(viewport: Viewport) -> Self {
        Self::new(0, 0, viewport.width, viewport.height)
    }

    /// Builds the rectangle spanned by two corner points in any order.
    #[must_use]
    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        let (left, right) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (top, bottom) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        Self::new(
            left,
            top,
            (right - left).unsigned_abs(),
            (bottom - top).unsigned_abs(),
        )
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(self) -> i32 {
        self.x.saturating_add_unsigned(self.width)
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(self) -> i32 {
        self.y.saturating_add_unsigned(self.height)
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return Self::new(left, top, 0, 0);
        }
        Self::new(
            left,
            top,
            (right - left).unsigned_abs(),
            (bottom - top).unsigned_abs(),
        )
    }
}
