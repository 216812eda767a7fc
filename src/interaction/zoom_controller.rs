use std::fmt;

use tracing::{debug, trace};

use crate::core::{Axis, AxisMapper, CoordinateRange, PixelRect, Viewport, ZoomFrame};
use crate::error::{PlotError, PlotResult};
use crate::interaction::{AnimationStep, ZoomAnimation, ZoomAxes, ZoomConfig};

/// Drags shorter than this on an axis leave that axis unzoomed.
pub const MIN_DRAG_PIXELS: u32 = 5;

const FRAME_EPSILON: f64 = 1e-9;

/// Spans never shrink below this many ulps of the outer limits' magnitude.
const PRECISION_FLOOR_ULPS: f64 = 1024.0;

/// Spans never shrink below this fraction of the outer limits' span.
const MIN_RELATIVE_SPAN: f64 = 1e-12;

/// Relative slack under which a span counts as sitting on its floor.
const SPAN_FLOOR_SLACK: f64 = 0.01;

/// Callback receiving every settled visible frame.
pub type ZoomListener = Box<dyn FnMut(&ZoomFrame) + Send>;

/// Visible-range state machine with zoom history and animated transitions.
///
/// The current frame is what is drawn; the destination is where it settles
/// (the animation target while one is in flight). The stack holds the
/// destinations that `zoom_out` returns to.
pub struct ZoomController {
    axes: ZoomAxes,
    limits: ZoomFrame,
    current: ZoomFrame,
    stack: Vec<ZoomFrame>,
    animation: Option<ZoomAnimation>,
    listeners: Vec<ZoomListener>,
    viewport: Viewport,
    config: ZoomConfig,
}

impl fmt::Debug for ZoomController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoomController")
            .field("axes", &self.axes)
            .field("limits", &self.limits)
            .field("current", &self.current)
            .field("stack", &self.stack)
            .field("animation", &self.animation)
            .field("listeners", &self.listeners.len())
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

impl ZoomController {
    pub fn new(limits: ZoomFrame, viewport: Viewport, axes: ZoomAxes, config: ZoomConfig) -> PlotResult<Self> {
        validate_frame(limits)?;
        Ok(Self {
            axes,
            limits,
            current: limits,
            stack: Vec::new(),
            animation: None,
            listeners: Vec::new(),
            viewport: viewport.clamped(),
            config,
        })
    }

    #[must_use]
    pub fn axes(&self) -> ZoomAxes {
        self.axes
    }

    #[must_use]
    pub fn outer_limits(&self) -> ZoomFrame {
        self.limits
    }

    /// Frame drawn right now, possibly mid-animation.
    #[must_use]
    pub fn current_frame(&self) -> ZoomFrame {
        self.current
    }

    /// Frame the controller settles on once the animation completes.
    #[must_use]
    pub fn destination(&self) -> ZoomFrame {
        self.animation
            .map_or(self.current, |animation| animation.target())
    }

    #[must_use]
    pub fn is_zoomed(&self) -> bool {
        !self.stack.is_empty()
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport.clamped();
    }

    #[must_use]
    pub fn config(&self) -> ZoomConfig {
        self.config
    }

    pub fn set_config(&mut self, config: ZoomConfig) {
        self.config = config;
    }

    pub fn add_listener(&mut self, listener: ZoomListener) {
        self.listeners.push(listener);
    }

    /// Animates to `frame`, remembering the present destination for `zoom_out`.
    ///
    /// Returns `Ok(false)` when the request collapses to an empty range once
    /// clamped to the outer limits.
    pub fn zoom_in(&mut self, frame: ZoomFrame) -> PlotResult<bool> {
        validate_frame(frame)?;
        let Some(request) = self.constrain(frame) else {
            debug!(?frame, "zoom request collapsed against outer limits");
            return Ok(false);
        };
        let destination = self.destination();
        self.stack.push(destination);
        debug!(?request, depth = self.stack.len(), "zoom in");
        self.animate_to(request);
        Ok(true)
    }

    /// Returns to the previous destination, or to the outer limits.
    pub fn zoom_out(&mut self) -> bool {
        if let Some(previous) = self.stack.pop() {
            debug!(?previous, depth = self.stack.len(), "zoom out");
            self.animate_to(previous);
            return true;
        }
        self.animate_to_limits_if_needed()
    }

    /// Clears the history and animates to the outer limits.
    pub fn reset_zoom(&mut self) -> bool {
        let had_history = !self.stack.is_empty();
        self.stack.clear();
        self.animate_to_limits_if_needed() || had_history
    }

    /// Zooms one axis by `notches` wheel steps around `pointer_unit`.
    ///
    /// Negative notches zoom in. The change is applied without animation.
    pub fn wheel_zoom(&mut self, axis: Axis, notches: i32, pointer_unit: f64) -> bool {
        if notches == 0 || !self.zooms(axis) || !pointer_unit.is_finite() {
            return false;
        }
        self.finish_animation_silently();
        let factor = match axis {
            Axis::X => self.config.wheel_factor_x,
            Axis::Y => self.config.wheel_factor_y,
        };
        let scale = factor.powi(notches.saturating_abs());
        let range = self.current.range(axis);
        if notches < 0 && range.span() <= self.min_span(axis) * (1.0 + SPAN_FLOOR_SLACK) {
            return false;
        }
        let span = if notches < 0 {
            range.span() * scale
        } else {
            range.span() / scale
        };
        if !span.is_finite() || span <= 0.0 {
            return false;
        }
        let anchor = pointer_unit.clamp(range.min, range.max);
        let fraction = if range.span() > 0.0 {
            (anchor - range.min) / range.span()
        } else {
            0.5
        };
        let min = anchor - fraction * span;
        let zoomed = CoordinateRange {
            min,
            max: min + span,
        };
        let mut frame = self.current;
        frame.set_range(axis, zoomed.shift_into(self.limits.range(axis)));
        let frame = self.apply_span_floor(frame);
        trace!(?axis, notches, ?frame, "wheel zoom");
        self.apply_immediately(frame)
    }

    /// Rubber-band zoom from a rectangle in widget pixels.
    pub fn zoom_to_pixel_rect(&mut self, rect: PixelRect) -> PlotResult<bool> {
        let use_x = self.axes.includes_x() && rect.width >= MIN_DRAG_PIXELS;
        let use_y = self.axes.includes_y() && rect.height >= MIN_DRAG_PIXELS;
        if !use_x && !use_y {
            return Ok(false);
        }
        let mut frame = self.destination();
        if use_x {
            let left = self.pixel_to_unit(Axis::X, f64::from(rect.x));
            let right = self.pixel_to_unit(Axis::X, f64::from(rect.right()));
            frame.x = CoordinateRange::for_axis(Axis::X, left.min(right), left.max(right))?;
        }
        if use_y {
            let top = self.pixel_to_unit(Axis::Y, f64::from(rect.y));
            let bottom = self.pixel_to_unit(Axis::Y, f64::from(rect.bottom()));
            frame.y = CoordinateRange::for_axis(Axis::Y, top.min(bottom), top.max(bottom))?;
        }
        self.zoom_in(frame)
    }

    /// Shows `[min, max]` on one axis at once, without animation.
    ///
    /// A range equal to the outer limits on every axis resets the zoom.
    pub fn set_visible_range(&mut self, axis: Axis, min: f64, max: f64) -> PlotResult<bool> {
        let range = CoordinateRange::for_axis(axis, min, max)?;
        if !self.zooms(axis) {
            return Ok(false);
        }
        self.finish_animation_silently();
        let mut frame = self.current;
        frame.set_range(axis, range);
        let Some(frame) = self.constrain(frame) else {
            return Ok(false);
        };
        Ok(self.apply_immediately(frame))
    }

    /// Shifts the visible ranges by a pointer drag, staying inside the limits.
    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64) -> bool {
        if !dx.is_finite() || !dy.is_finite() {
            return false;
        }
        self.finish_animation_silently();
        let mut frame = self.current;
        if self.axes.includes_x() && dx != 0.0 {
            let units_per_pixel = frame.x.span() / f64::from(self.viewport.width);
            frame.x = shifted(frame.x, -dx * units_per_pixel).shift_into(self.limits.x);
        }
        if self.axes.includes_y() && dy != 0.0 {
            let units_per_pixel = frame.y.span() / f64::from(self.viewport.height);
            frame.y = shifted(frame.y, dy * units_per_pixel).shift_into(self.limits.y);
        }
        if frame.approx_eq(self.current, FRAME_EPSILON) {
            return false;
        }
        self.current = frame;
        self.notify();
        true
    }

    /// Replaces the outer limits, re-clamping the history and the current frame.
    pub fn set_outer_limits(&mut self, limits: ZoomFrame) -> PlotResult<()> {
        validate_frame(limits)?;
        let was_zoomed = self.is_zoomed();
        self.limits = limits;
        let stack = std::mem::take(&mut self.stack);
        self.stack = stack
            .into_iter()
            .filter_map(|frame| self.constrain(frame))
            .collect();

        let previous = self.current;
        if was_zoomed {
            self.current = self.constrain(self.current).unwrap_or(limits);
            if let Some(animation) = self.animation {
                let target = self.constrain(animation.target()).unwrap_or(limits);
                self.animation = Some(ZoomAnimation::new(target));
            }
        } else {
            self.animation = None;
            self.current = limits;
        }
        debug!(?limits, depth = self.stack.len(), "outer limits changed");
        if self.animation.is_none() && !self.current.approx_eq(previous, FRAME_EPSILON) {
            self.notify();
        }
        Ok(())
    }

    /// Advances the animation by elapsed wall time.
    pub fn tick(&mut self, delta_seconds: f64) -> AnimationStep {
        let Some(mut animation) = self.animation else {
            return AnimationStep::Idle;
        };
        let due = animation.due_steps(delta_seconds, self.config.animation.step_interval_seconds);
        self.animation = Some(animation);
        let mut outcome = AnimationStep::Idle;
        for _ in 0..due {
            outcome = self.step_animation();
            if matches!(outcome, AnimationStep::Settled(_)) {
                break;
            }
        }
        outcome
    }

    /// Advances the animation by exactly one step.
    pub fn step_animation(&mut self) -> AnimationStep {
        let Some(mut animation) = self.animation else {
            return AnimationStep::Idle;
        };
        let (frame, settled) = animation.step(self.current, self.config.animation.steps);
        self.current = frame;
        if settled {
            self.animation = None;
            trace!(?frame, "zoom animation settled");
            self.notify();
            AnimationStep::Settled(frame)
        } else {
            self.animation = Some(animation);
            AnimationStep::Moved(frame)
        }
    }

    #[must_use]
    pub fn mapper(&self, axis: Axis) -> AxisMapper {
        match axis {
            Axis::X => AxisMapper::horizontal(self.viewport.width, self.current.x),
            Axis::Y => AxisMapper::vertical(self.viewport.height, self.current.y),
        }
    }

    #[must_use]
    pub fn unit_to_pixel(&self, axis: Axis, value: f64) -> i32 {
        self.mapper(axis).to_pixel(value)
    }

    #[must_use]
    pub fn pixel_to_unit(&self, axis: Axis, pixel: f64) -> f64 {
        self.mapper(axis).to_unit(pixel)
    }

    fn zooms(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.axes.includes_x(),
            Axis::Y => self.axes.includes_y(),
        }
    }

    /// Clamps to the limits, pins fixed axes and enforces the resolution floor.
    fn constrain(&self, frame: ZoomFrame) -> Option<ZoomFrame> {
        let mut frame = frame.clamp_to(self.limits);
        if !self.axes.includes_x() {
            frame.x = self.limits.x;
        }
        if !self.axes.includes_y() {
            frame.y = self.limits.y;
        }
        let collapsed = (self.axes.includes_x() && frame.x.is_degenerate())
            || (self.axes.includes_y() && frame.y.is_degenerate());
        if collapsed {
            return None;
        }
        Some(self.apply_span_floor(frame))
    }

    /// Widens every zoomable axis to its narrowest allowed span.
    fn apply_span_floor(&self, mut frame: ZoomFrame) -> ZoomFrame {
        for axis in [Axis::X, Axis::Y] {
            if !self.zooms(axis) {
                continue;
            }
            let min_span = self.min_span(axis);
            let range = frame.range(axis);
            if range.span() < min_span {
                let center = range.center();
                let widened = CoordinateRange {
                    min: center - min_span * 0.5,
                    max: center + min_span * 0.5,
                };
                frame.set_range(axis, widened.shift_into(self.limits.range(axis)));
            }
        }
        frame
    }

    /// Narrowest span on `axis`: the configured x resolution or the point
    /// where neighbouring `f64` values can no longer be told apart.
    fn min_span(&self, axis: Axis) -> f64 {
        let limits = self.limits.range(axis);
        let magnitude = limits.min.abs().max(limits.max.abs());
        let precision = (magnitude * f64::EPSILON * PRECISION_FLOOR_ULPS)
            .max(limits.span() * MIN_RELATIVE_SPAN);
        let resolution = match (axis, self.config.min_resolution) {
            (Axis::X, Some(resolution)) if resolution.is_finite() && resolution > 0.0 => {
                f64::from(self.viewport.width) * resolution
            }
            _ => 0.0,
        };
        precision.max(resolution)
    }

    fn animate_to(&mut self, target: ZoomFrame) {
        if self.config.animation.steps == 0 {
            self.animation = None;
            self.current = target;
            self.notify();
            return;
        }
        self.animation = Some(ZoomAnimation::new(target));
    }

    fn animate_to_limits_if_needed(&mut self) -> bool {
        if self.destination().approx_eq(self.limits, FRAME_EPSILON) {
            return false;
        }
        self.animate_to(self.limits);
        true
    }

    /// Jumps to the pending destination without notifying listeners.
    fn finish_animation_silently(&mut self) {
        if let Some(animation) = self.animation.take() {
            self.current = animation.target();
        }
    }

    /// Applies a frame at once, maintaining the implicit outer-frame entry.
    fn apply_immediately(&mut self, frame: ZoomFrame) -> bool {
        if frame.approx_eq(self.current, FRAME_EPSILON) {
            return false;
        }
        if frame.approx_eq(self.limits, FRAME_EPSILON) {
            self.stack.clear();
        } else if self.stack.is_empty() {
            self.stack.push(self.limits);
        }
        self.current = frame;
        self.notify();
        true
    }

    fn notify(&mut self) {
        let frame = self.current;
        for listener in &mut self.listeners {
            listener(&frame);
        }
    }
}

fn shifted(range: CoordinateRange, delta: f64) -> CoordinateRange {
    CoordinateRange {
        min: range.min + delta,
        max: range.max + delta,
    }
}

fn validate_frame(frame: ZoomFrame) -> PlotResult<()> {
    for axis in [Axis::X, Axis::Y] {
        let range = frame.range(axis);
        if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
            return Err(PlotError::InvalidRange {
                axis: axis.name(),
                min: range.min,
                max: range.max,
            });
        }
    }
    Ok(())
}
