use serde::{Deserialize, Serialize};

use crate::core::CoordinateRange;
use crate::error::{PlotError, PlotResult};
use crate::render::surface::Argb;

/// Amplitude-to-colour gradient used for waterfall rows.
///
/// Stops are evenly spaced over `amplitude`; values outside it saturate to
/// the end colours and non-finite values map to the first stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorMapStops")]
pub struct ColorMap {
    amplitude: CoordinateRange,
    stops: Vec<Argb>,
}

#[derive(Deserialize)]
struct ColorMapStops {
    amplitude: CoordinateRange,
    stops: Vec<Argb>,
}

impl TryFrom<ColorMapStops> for ColorMap {
    type Error = PlotError;

    fn try_from(raw: ColorMapStops) -> Result<Self, Self::Error> {
        Self::new(raw.amplitude, raw.stops)
    }
}

impl Default for ColorMap {
    fn default() -> Self {
        Self {
            amplitude: CoordinateRange { min: -120.0, max: 0.0 },
            stops: vec![
                Argb::BLACK,
                Argb::BLUE,
                Argb::rgb(0x00, 0xC0, 0xC0),
                Argb::YELLOW,
                Argb::RED,
            ],
        }
    }
}

impl ColorMap {
    pub fn new(amplitude: CoordinateRange, stops: Vec<Argb>) -> PlotResult<Self> {
        if stops.is_empty() {
            return Err(PlotError::InvalidData(
                "color map needs at least one stop".to_owned(),
            ));
        }
        Ok(Self { amplitude, stops })
    }

    #[must_use]
    pub fn amplitude(&self) -> CoordinateRange {
        self.amplitude
    }

    pub fn set_amplitude(&mut self, amplitude: CoordinateRange) {
        self.amplitude = amplitude;
    }

    #[must_use]
    pub fn color_for(&self, value: f64) -> Argb {
        let first = self.stops[0];
        if self.stops.len() == 1 || !value.is_finite() {
            return first;
        }
        let span = self.amplitude.span();
        let fraction = if span > 0.0 {
            ((value - self.amplitude.min) / span).clamp(0.0, 1.0)
        } else if value >= self.amplitude.max {
            1.0
        } else {
            0.0
        };
        let position = fraction * (self.stops.len() - 1) as f64;
        let lower = position.floor() as usize;
        let upper = (lower + 1).min(self.stops.len() - 1);
        self.stops[lower].lerp(self.stops[upper], position - lower as f64)
    }

    /// Maps `samples` onto `out`, resampling to `out.len()` columns.
    ///
    /// `samples[bins]` is the visible part of the line; each output column
    /// takes the maximum of the bins it covers so narrow peaks stay visible.
    pub fn map_line(&self, samples: &[f32], bins: std::ops::Range<usize>, out: &mut [Argb]) {
        let bins = bins.start.min(samples.len())..bins.end.min(samples.len());
        let visible = &samples[bins];
        if visible.is_empty() {
            out.fill(self.color_for(f64::NAN));
            return;
        }
        let columns = out.len();
        for (column, pixel) in out.iter_mut().enumerate() {
            let first = column * visible.len() / columns;
            let last = ((column + 1) * visible.len() / columns).max(first + 1);
            let peak = visible[first..last.min(visible.len())]
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max);
            *pixel = self.color_for(f64::from(peak));
        }
    }
}
