//! Screen-space projection of sample series, with min/max decimation.
//!
//! Functions here are deterministic and side-effect free; the caching and
//! locking around them lives in [`crate::api::SeriesDecimationCache`].

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::mapper::AxisMapper;
use crate::core::series::SampleSeries;
use crate::core::types::CoordinateRange;

/// Samples kept beyond each edge of the visible window.
///
/// At high zoom factors the segment crossing the plot edge starts at a sample
/// that is itself off-screen; two guard samples per side keep it drawn.
pub const EDGE_GUARD_SAMPLES: usize = 2;

/// Points-per-pixel above which the decimated path is used.
pub const DEFAULT_DECIMATION_THRESHOLD: f64 = 2.0;

/// Which projection produced a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionPath {
    /// One pixel pair per sample.
    Normal,
    /// One min/max pair per pixel column.
    Decimated,
}

/// Pixel-space polyline plus the unit-space `y` each point was derived from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectedPolyline {
    pub x_pixels: Vec<i32>,
    pub y_pixels: Vec<i32>,
    pub y_units: Vec<f64>,
}

impl ProjectedPolyline {
    #[must_use]
    pub fn len(&self) -> usize {
        self.x_pixels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x_pixels.is_empty()
    }

    pub fn clear(&mut self) {
        self.x_pixels.clear();
        self.y_pixels.clear();
        self.y_units.clear();
    }

    fn push(&mut self, x_pixel: i32, y_unit: f64, y_mapper: &AxisMapper) {
        self.x_pixels.push(x_pixel);
        self.y_pixels.push(y_mapper.to_pixel_unclamped(y_unit));
        self.y_units.push(y_unit);
    }
}

/// Index range covering `x_range`, widened by [`EDGE_GUARD_SAMPLES`] per side.
#[must_use]
pub fn visible_index_range(series: &dyn SampleSeries, x_range: CoordinateRange) -> Range<usize> {
    let len = series.len();
    let start = search_position(series, x_range.min).saturating_sub(EDGE_GUARD_SAMPLES);
    let end = search_position(series, x_range.max)
        .saturating_add(EDGE_GUARD_SAMPLES)
        .min(len);
    start.min(end)..end
}

fn search_position(series: &dyn SampleSeries, x: f64) -> usize {
    match series.binary_search_x(x) {
        Ok(index) | Err(index) => index,
    }
}

/// Average number of samples per pixel column for an index range.
#[must_use]
pub fn points_per_pixel(indices: &Range<usize>, width: u32) -> f64 {
    indices.len() as f64 / f64::from(width.max(1))
}

#[must_use]
pub fn select_path(indices: &Range<usize>, width: u32, threshold: f64) -> ProjectionPath {
    if points_per_pixel(indices, width) <= threshold {
        ProjectionPath::Normal
    } else {
        ProjectionPath::Decimated
    }
}

/// Projects every finite sample in `indices` to one pixel pair.
pub fn project_normal(
    series: &dyn SampleSeries,
    indices: Range<usize>,
    x_mapper: &AxisMapper,
    y_mapper: &AxisMapper,
    out: &mut ProjectedPolyline,
) {
    out.clear();
    out.x_pixels.reserve(indices.len());
    out.y_pixels.reserve(indices.len());
    out.y_units.reserve(indices.len());
    for index in indices {
        let y = series.y(index);
        if !y.is_finite() {
            continue;
        }
        out.push(x_mapper.to_pixel_unclamped(series.x(index)), y, y_mapper);
    }
}

/// Collapses each run of samples sharing a pixel column into its min and max.
///
/// Samples are ordered by `x`, so every column's samples form one contiguous
/// run and the emitted pair is the column's true extremum.
pub fn project_decimated(
    series: &dyn SampleSeries,
    indices: Range<usize>,
    x_mapper: &AxisMapper,
    y_mapper: &AxisMapper,
    out: &mut ProjectedPolyline,
) {
    out.clear();
    let (pixel_min, pixel_max) = x_mapper.pixel_bounds();
    let columns = usize::try_from(pixel_max - pixel_min).unwrap_or(0) + 1;
    let capacity = 2 * (columns + 1) * 2;
    out.x_pixels.reserve(capacity);
    out.y_pixels.reserve(capacity);
    out.y_units.reserve(capacity);

    let mut run: Option<(i32, f64, f64)> = None;
    for index in indices {
        let y = series.y(index);
        if !y.is_finite() {
            continue;
        }
        let column = x_mapper.to_pixel_unclamped(series.x(index));
        run = match run {
            Some((current, min, max)) if current == column => Some((current, min.min(y), max.max(y))),
            Some((current, min, max)) => {
                out.push(current, min, y_mapper);
                out.push(current, max, y_mapper);
                Some((column, y, y))
            }
            None => Some((column, y, y)),
        };
    }
    if let Some((current, min, max)) = run {
        out.push(current, min, y_mapper);
        out.push(current, max, y_mapper);
    }
}

/// Recomputes `y_pixels` from the stored `y_units` for a new vertical mapping.
pub fn remap_y(polyline: &mut ProjectedPolyline, y_mapper: &AxisMapper) {
    polyline.y_pixels.clear();
    polyline.y_pixels.extend(
        polyline
            .y_units
            .iter()
            .map(|value| y_mapper.to_pixel_unclamped(*value)),
    );
}

/// Index range of points to stroke so that the polyline covers `[left, right)`.
///
/// One extra point is kept on each side so segments crossing the clip edges
/// are still drawn.
#[must_use]
pub fn clip_point_range(x_pixels: &[i32], left: i32, right: i32) -> Range<usize> {
    let start = x_pixels.partition_point(|x| *x < left).saturating_sub(1);
    let end = (x_pixels.partition_point(|x| *x < right) + 1).min(x_pixels.len());
    start.min(end)..end
}

#[cfg(test)]
mod tests {
    use super::{
        ProjectedPolyline, ProjectionPath, clip_point_range, project_decimated, project_normal,
        select_path, visible_index_range,
    };
    use crate::core::{AxisMapper, CoordinateRange, UniformSeries};

    fn ramp(len: usize) -> UniformSeries {
        let y = (0..len).map(|i| (i % 7) as f32).collect();
        UniformSeries::new(0.0, 1.0, y).expect("series")
    }

    #[test]
    fn visible_range_keeps_two_guard_samples_per_side() {
        let series = ramp(100);
        let range = CoordinateRange::new(10.5, 20.5).expect("range");
        assert_eq!(visible_index_range(&series, range), 9..23);

        let everything = CoordinateRange::new(-10.0, 500.0).expect("range");
        assert_eq!(visible_index_range(&series, everything), 0..100);
    }

    #[test]
    fn path_selection_uses_points_per_pixel() {
        assert_eq!(select_path(&(0..200), 100, 2.0), ProjectionPath::Normal);
        assert_eq!(select_path(&(0..201), 100, 2.0), ProjectionPath::Decimated);
    }

    #[test]
    fn normal_projection_emits_one_point_per_finite_sample() {
        let series = UniformSeries::new(0.0, 1.0, vec![0.0, f32::NAN, 2.0, 3.0]).expect("series");
        let x = AxisMapper::horizontal(4, CoordinateRange::new(0.0, 3.0).expect("x"));
        let y = AxisMapper::vertical(4, CoordinateRange::new(0.0, 3.0).expect("y"));
        let mut out = ProjectedPolyline::default();
        project_normal(&series, 0..4, &x, &y, &mut out);
        assert_eq!(out.x_pixels, vec![0, 2, 3]);
        assert_eq!(out.y_pixels, vec![3, 1, 0]);
    }

    #[test]
    fn decimated_projection_emits_column_min_max_pairs() {
        let series = ramp(1_000);
        let x = AxisMapper::horizontal(10, CoordinateRange::new(0.0, 999.0).expect("x"));
        let y = AxisMapper::vertical(50, CoordinateRange::new(0.0, 6.0).expect("y"));
        let mut out = ProjectedPolyline::default();
        project_decimated(&series, 0..1_000, &x, &y, &mut out);

        assert_eq!(out.len() % 2, 0);
        assert!(out.len() <= 2 * (10 + 1) * 2);
        for pair in out.y_units.chunks(2) {
            assert_eq!(pair, [0.0, 6.0]);
        }
    }

    #[test]
    fn clip_range_keeps_one_point_of_slack() {
        let xs = [-5, 0, 3, 7, 12, 20];
        assert_eq!(clip_point_range(&xs, 0, 10), 0..5);
        assert_eq!(clip_point_range(&xs, 4, 8), 2..5);
        assert_eq!(clip_point_range(&xs, 30, 40), 5..6);
    }
}
