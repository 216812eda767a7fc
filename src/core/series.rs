//! Read-only sample series consumed by the line-graph widget.

use std::cmp::Ordering;

use crate::error::{PlotError, PlotResult};

/// Ordered `(x, y)` samples with non-decreasing `x`.
///
/// Implementations are read-only views; plotting code never mutates them.
pub trait SampleSeries: Send + Sync {
    fn len(&self) -> usize;

    fn x(&self, index: usize) -> f64;

    fn y(&self, index: usize) -> f64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Searches for `x`, following [`slice::binary_search`] conventions.
    ///
    /// `Ok(index)` holds a matching sample, `Err(index)` the insertion point
    /// that keeps the series ordered.
    fn binary_search_x(&self, x: f64) -> Result<usize, usize> {
        let mut low = 0usize;
        let mut high = self.len();
        while low < high {
            let mid = low + (high - low) / 2;
            match self.x(mid).total_cmp(&x) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(low)
    }
}

/// Explicit single-precision `x` and `y` arrays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XySeries {
    x: Vec<f32>,
    y: Vec<f32>,
}

impl XySeries {
    pub fn new(x: Vec<f32>, y: Vec<f32>) -> PlotResult<Self> {
        ensure_same_len(x.len(), y.len())?;
        ensure_ordered(x.iter().map(|value| f64::from(*value)))?;
        Ok(Self { x, y })
    }
}

impl SampleSeries for XySeries {
    fn len(&self) -> usize {
        self.x.len()
    }

    fn x(&self, index: usize) -> f64 {
        f64::from(self.x[index])
    }

    fn y(&self, index: usize) -> f64 {
        f64::from(self.y[index])
    }

    fn binary_search_x(&self, x: f64) -> Result<usize, usize> {
        self.x
            .binary_search_by(|probe| f64::from(*probe).total_cmp(&x))
    }
}

/// Evenly sampled series: `x(i) = x_start + i * x_step`.
///
/// Only `y` is stored, which halves the memory of long spectrum traces.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSeries {
    x_start: f64,
    x_step: f64,
    y: Vec<f32>,
}

impl UniformSeries {
    pub fn new(x_start: f64, x_step: f64, y: Vec<f32>) -> PlotResult<Self> {
        if !x_start.is_finite() || !x_step.is_finite() || x_step <= 0.0 {
            return Err(PlotError::InvalidData(
                "uniform series needs a finite start and a finite step > 0".to_owned(),
            ));
        }
        Ok(Self { x_start, x_step, y })
    }

    #[must_use]
    pub fn x_step(&self) -> f64 {
        self.x_step
    }
}

impl SampleSeries for UniformSeries {
    fn len(&self) -> usize {
        self.y.len()
    }

    fn x(&self, index: usize) -> f64 {
        self.x_start + index as f64 * self.x_step
    }

    fn y(&self, index: usize) -> f64 {
        f64::from(self.y[index])
    }

    fn binary_search_x(&self, x: f64) -> Result<usize, usize> {
        let len = self.y.len();
        if x.is_nan() || len == 0 {
            return Err(0);
        }
        let position = (x - self.x_start) / self.x_step;
        if position < 0.0 {
            return Err(0);
        }
        if position > (len - 1) as f64 {
            return Err(len);
        }
        let floor = position.floor() as usize;
        if self.x(floor) == x {
            Ok(floor)
        } else if floor + 1 < len && self.x(floor + 1) == x {
            Ok(floor + 1)
        } else if self.x(floor) < x {
            Err(floor + 1)
        } else {
            Err(floor)
        }
    }
}

/// Double-precision `x` for high-dynamic-range axes (e.g. absolute time).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideXySeries {
    x: Vec<f64>,
    y: Vec<f32>,
}

impl WideXySeries {
    pub fn new(x: Vec<f64>, y: Vec<f32>) -> PlotResult<Self> {
        ensure_same_len(x.len(), y.len())?;
        ensure_ordered(x.iter().copied())?;
        Ok(Self { x, y })
    }
}

impl SampleSeries for WideXySeries {
    fn len(&self) -> usize {
        self.x.len()
    }

    fn x(&self, index: usize) -> f64 {
        self.x[index]
    }

    fn y(&self, index: usize) -> f64 {
        f64::from(self.y[index])
    }

    fn binary_search_x(&self, x: f64) -> Result<usize, usize> {
        self.x.binary_search_by(|probe| probe.total_cmp(&x))
    }
}

fn ensure_same_len(x_len: usize, y_len: usize) -> PlotResult<()> {
    if x_len != y_len {
        return Err(PlotError::InvalidData(format!(
            "series x/y length mismatch: x={x_len}, y={y_len}"
        )));
    }
    Ok(())
}

fn ensure_ordered(values: impl Iterator<Item = f64>) -> PlotResult<()> {
    let mut previous = f64::NEG_INFINITY;
    for (index, value) in values.enumerate() {
        if !value.is_finite() {
            return Err(PlotError::InvalidData(format!(
                "series x at index {index} must be finite"
            )));
        }
        if value < previous {
            return Err(PlotError::InvalidData(format!(
                "series x must be non-decreasing (index {index})"
            )));
        }
        previous = value;
    }
    Ok(())
}
