use serde::{Deserialize, Serialize};

use crate::core::decimation::DEFAULT_DECIMATION_THRESHOLD;
use crate::error::{PlotError, PlotResult};
use crate::interaction::{AnimationConfig, ZoomConfig};
use crate::render::{Argb, LayerStack};

/// Widget configuration shared by the waterfall and the line graph.
///
/// This type is serializable so host applications can persist/load plot
/// setup; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub background: Argb,
    /// Narrowest horizontal span per pixel, in x units. `None` disables the floor.
    pub min_zoom_resolution: Option<f64>,
    /// Points per pixel above which series are min/max decimated.
    pub decimation_threshold: f64,
    pub animation_steps: u32,
    pub animation_step_interval_seconds: f64,
    pub wheel_factor_x: f64,
    pub wheel_factor_y: f64,
    pub layer_order: LayerStack,
}

impl Default for PlotConfig {
    fn default() -> Self {
        let zoom = ZoomConfig::default();
        Self {
            background: Argb::BLACK,
            min_zoom_resolution: zoom.min_resolution,
            decimation_threshold: DEFAULT_DECIMATION_THRESHOLD,
            animation_steps: zoom.animation.steps,
            animation_step_interval_seconds: zoom.animation.step_interval_seconds,
            wheel_factor_x: zoom.wheel_factor_x,
            wheel_factor_y: zoom.wheel_factor_y,
            layer_order: LayerStack::canonical(),
        }
    }
}

impl PlotConfig {
    #[must_use]
    pub fn with_background(mut self, background: Argb) -> Self {
        self.background = background;
        self
    }

    #[must_use]
    pub fn with_min_zoom_resolution(mut self, resolution: Option<f64>) -> Self {
        self.min_zoom_resolution = resolution;
        self
    }

    #[must_use]
    pub fn with_decimation_threshold(mut self, threshold: f64) -> Self {
        self.decimation_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_animation(mut self, steps: u32, step_interval_seconds: f64) -> Self {
        self.animation_steps = steps;
        self.animation_step_interval_seconds = step_interval_seconds;
        self
    }

    #[must_use]
    pub fn with_wheel_factors(mut self, x: f64, y: f64) -> Self {
        self.wheel_factor_x = x;
        self.wheel_factor_y = y;
        self
    }

    #[must_use]
    pub fn with_layer_order(mut self, layer_order: LayerStack) -> Self {
        self.layer_order = layer_order;
        self
    }

    #[must_use]
    pub fn zoom_config(&self) -> ZoomConfig {
        ZoomConfig {
            animation: AnimationConfig {
                steps: self.animation_steps,
                step_interval_seconds: self.animation_step_interval_seconds,
            },
            wheel_factor_x: self.wheel_factor_x,
            wheel_factor_y: self.wheel_factor_y,
            min_resolution: self.min_zoom_resolution,
        }
    }

    pub fn validate(&self) -> PlotResult<()> {
        if let Some(resolution) = self.min_zoom_resolution {
            if !resolution.is_finite() || resolution <= 0.0 {
                return Err(PlotError::InvalidData(
                    "min_zoom_resolution must be finite and > 0".to_owned(),
                ));
            }
        }
        if !self.decimation_threshold.is_finite() || self.decimation_threshold <= 0.0 {
            return Err(PlotError::InvalidData(
                "decimation_threshold must be finite and > 0".to_owned(),
            ));
        }
        if !self.animation_step_interval_seconds.is_finite()
            || self.animation_step_interval_seconds < 0.0
        {
            return Err(PlotError::InvalidData(
                "animation_step_interval_seconds must be finite and >= 0".to_owned(),
            ));
        }
        for (name, factor) in [
            ("wheel_factor_x", self.wheel_factor_x),
            ("wheel_factor_y", self.wheel_factor_y),
        ] {
            if !factor.is_finite() || factor <= 0.0 || factor >= 1.0 {
                return Err(PlotError::InvalidData(format!(
                    "{name} must be finite and in (0, 1)"
                )));
            }
        }
        Ok(())
    }

    /// Serializes config to pretty JSON.
    pub fn to_json_pretty(&self) -> PlotResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PlotError::InvalidData(format!("failed to serialize config: {e}")))
    }

    /// Deserializes and validates config from JSON.
    pub fn from_json_str(input: &str) -> PlotResult<Self> {
        let config: Self = serde_json::from_str(input)
            .map_err(|e| PlotError::InvalidData(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::PlotConfig;
    use crate::render::{Argb, LayerKind, LayerStack};

    #[test]
    fn defaults_match_documented_values() {
        let config = PlotConfig::default();
        assert_eq!(config.decimation_threshold, 2.0);
        assert_eq!(config.animation_steps, 10);
        assert_eq!(config.wheel_factor_x, 0.7);
        assert_eq!(config.wheel_factor_y, 0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = PlotConfig::from_json_str(r#"{ "animation_steps": 4 }"#).expect("config");
        assert_eq!(config.animation_steps, 4);
        assert_eq!(config.layer_order, LayerStack::canonical());
    }

    #[test]
    fn json_round_trip_keeps_custom_values() {
        let config = PlotConfig::default()
            .with_background(Argb::rgb(1, 2, 3))
            .with_min_zoom_resolution(Some(0.5))
            .with_layer_order(
                LayerStack::from_order(vec![LayerKind::Background, LayerKind::Series])
                    .expect("order"),
            );
        let json = config.to_json_pretty().expect("json");
        assert_eq!(PlotConfig::from_json_str(&json).expect("parse"), config);
    }

    #[test]
    fn validation_rejects_bad_factors() {
        let config = PlotConfig::default().with_wheel_factors(1.5, 0.9);
        assert!(config.validate().is_err());
        let config = PlotConfig::default().with_decimation_threshold(f64::NAN);
        assert!(config.validate().is_err());
    }
}
