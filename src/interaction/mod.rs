mod zoom_controller;

use serde::{Deserialize, Serialize};

use crate::core::ZoomFrame;

pub use zoom_controller::{MIN_DRAG_PIXELS, ZoomController, ZoomListener};

/// Which axes respond to zoom and pan gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoomAxes {
    Horizontal,
    Vertical,
    Both,
}

impl ZoomAxes {
    #[must_use]
    pub fn includes_x(self) -> bool {
        matches!(self, Self::Horizontal | Self::Both)
    }

    #[must_use]
    pub fn includes_y(self) -> bool {
        matches!(self, Self::Vertical | Self::Both)
    }
}

/// Tuning for deterministic zoom animation stepping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Steps from start to target; zero snaps immediately.
    pub steps: u32,
    /// Time between two steps.
    pub step_interval_seconds: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            steps: 10,
            step_interval_seconds: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub animation: AnimationConfig,
    /// Span multiplier per wheel notch on the horizontal axis.
    pub wheel_factor_x: f64,
    /// Span multiplier per wheel notch on the vertical axis.
    pub wheel_factor_y: f64,
    /// Narrowest horizontal span per pixel, in x units.
    pub min_resolution: Option<f64>,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            animation: AnimationConfig::default(),
            wheel_factor_x: 0.7,
            wheel_factor_y: 0.9,
            min_resolution: None,
        }
    }
}

/// Result of advancing the zoom animation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AnimationStep {
    /// No animation in flight.
    Idle,
    /// The current frame moved toward the target.
    Moved(ZoomFrame),
    /// The target was reached; listeners have been notified.
    Settled(ZoomFrame),
}

impl AnimationStep {
    #[must_use]
    pub fn changed(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// In-flight transition toward `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomAnimation {
    target: ZoomFrame,
    steps_taken: u32,
    pending_seconds: f64,
}

impl ZoomAnimation {
    #[must_use]
    pub fn new(target: ZoomFrame) -> Self {
        Self {
            target,
            steps_taken: 0,
            pending_seconds: 0.0,
        }
    }

    #[must_use]
    pub fn target(&self) -> ZoomFrame {
        self.target
    }

    #[must_use]
    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }

    /// Advances one step from `current`.
    ///
    /// Each step covers half of the remaining distance; the last one snaps to
    /// the target. The boolean is `true` once the target is reached.
    pub fn step(&mut self, current: ZoomFrame, total_steps: u32) -> (ZoomFrame, bool) {
        self.steps_taken = self.steps_taken.saturating_add(1);
        if self.steps_taken >= total_steps {
            (self.target, true)
        } else {
            (current.approach(self.target, 0.5), false)
        }
    }

    /// Accumulates elapsed time and returns how many steps are due.
    pub fn due_steps(&mut self, delta_seconds: f64, step_interval_seconds: f64) -> u32 {
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return 0;
        }
        if !step_interval_seconds.is_finite() || step_interval_seconds <= 0.0 {
            return u32::MAX;
        }
        self.pending_seconds += delta_seconds;
        let due = (self.pending_seconds / step_interval_seconds).floor();
        self.pending_seconds -= due * step_interval_seconds;
        if due >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            due as u32
        }
    }
}
