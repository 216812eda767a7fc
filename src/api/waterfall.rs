use std::collections::VecDeque;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::core::{Axis, CoordinateRange, PixelRect, Viewport, ZoomFrame};
use crate::error::{PlotError, PlotResult};
use crate::interaction::{AnimationStep, ZoomAxes, ZoomController, ZoomListener};
use crate::render::{
    Argb, BlendMode, CircularPixelBuffer, ColorMap, GridLayer, LayerKind, OverlayAlignmentLayer,
    PaintContext, PixelSurface, ScratchArena,
};

use super::config::PlotConfig;
use super::widget::{Decorations, PlotWidget, RedrawFlag, lock};

/// Lines kept for re-rendering, newest at the back.
#[derive(Debug)]
struct LineHistory {
    lines: VecDeque<(DateTime<Utc>, Vec<f32>)>,
    capacity: usize,
    bins: u32,
    row: Vec<Argb>,
}

impl LineHistory {
    fn push(&mut self, timestamp: DateTime<Utc>, samples: Vec<f32>) {
        self.lines.push_back((timestamp, samples));
        self.trim();
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.trim();
    }

    fn trim(&mut self) {
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }
}

/// Scrolling amplitude image with a registered detection overlay.
///
/// Horizontal units are the data's x units (e.g. frequency), split evenly
/// into `bins`. Vertical units count rows upward from the bottom edge, where
/// the newest line is drawn. Only the horizontal axis zooms.
///
/// Locks are taken in the order history, amplitude, overlay; the zoom,
/// colour-map and decoration locks are never held while taking another.
/// Rows are mapped through the zoom destination, so lines arriving during
/// an animation already match the image re-rendered when it settles.
pub struct WaterfallWidget {
    config: PlotConfig,
    color_map: Mutex<Arc<ColorMap>>,
    history: Mutex<LineHistory>,
    amplitude: Mutex<CircularPixelBuffer>,
    overlay: Mutex<OverlayAlignmentLayer>,
    zoom: Mutex<ZoomController>,
    decorations: Mutex<Decorations>,
    redraw: RedrawFlag,
}

impl std::fmt::Debug for WaterfallWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaterfallWidget")
            .field("config", &self.config)
            .field("zoom", &self.zoom)
            .finish_non_exhaustive()
    }
}

impl WaterfallWidget {
    pub fn new(
        x_limits: CoordinateRange,
        bins: u32,
        viewport: Viewport,
        color_map: ColorMap,
        config: PlotConfig,
    ) -> PlotResult<Self> {
        config.validate()?;
        if bins == 0 {
            return Err(PlotError::InvalidData(
                "waterfall needs at least one bin".to_owned(),
            ));
        }
        let viewport = viewport.checked()?;
        let limits = ZoomFrame::new(x_limits, row_range(viewport.height));
        let zoom = ZoomController::new(limits, viewport, ZoomAxes::Horizontal, config.zoom_config())?;

        let mut amplitude = CircularPixelBuffer::new(config.background);
        amplitude.set_size_and_clear(viewport.width, viewport.height);
        let mut overlay = OverlayAlignmentLayer::new(Argb::TRANSPARENT);
        overlay.set_size_and_clear(bins, viewport.width, viewport.height);

        debug!(
            bins,
            width = viewport.width,
            height = viewport.height,
            "waterfall created"
        );
        Ok(Self {
            config,
            color_map: Mutex::new(Arc::new(color_map)),
            history: Mutex::new(LineHistory {
                lines: VecDeque::with_capacity(viewport.height as usize),
                capacity: viewport.height as usize,
                bins,
                row: Vec::new(),
            }),
            amplitude: Mutex::new(amplitude),
            overlay: Mutex::new(overlay),
            zoom: Mutex::new(zoom),
            decorations: Mutex::new(Decorations::default()),
            redraw: RedrawFlag::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PlotConfig {
        &self.config
    }

    #[must_use]
    pub fn bins(&self) -> u32 {
        lock(&self.history).bins
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        lock(&self.history).lines.len()
    }

    #[must_use]
    pub fn zoom_frame(&self) -> ZoomFrame {
        lock(&self.zoom).current_frame()
    }

    #[must_use]
    pub fn is_zoomed(&self) -> bool {
        lock(&self.zoom).is_zoomed()
    }

    pub fn add_zoom_listener(&self, listener: ZoomListener) {
        lock(&self.zoom).add_listener(listener);
    }

    /// Replaces the colour map and re-renders the image from history.
    pub fn set_color_map(&self, color_map: ColorMap) {
        *lock(&self.color_map) = Arc::new(color_map);
        self.rerender_image();
        self.redraw.request();
    }

    /// Marks a detection on the newest line at reference bin `bin`.
    pub fn mark_detection(&self, bin: u32, color: Argb) {
        self.mark_detection_span(bin, bin, color);
    }

    /// Marks bins `first..=last` on the newest line.
    pub fn mark_detection_span(&self, first: u32, last: u32, color: Argb) {
        let first = i32::try_from(first).unwrap_or(i32::MAX);
        let last = i32::try_from(last).unwrap_or(i32::MAX);
        lock(&self.overlay).draw_line_bottom(first, last, color);
        self.redraw.request();
    }

    /// Capture time of the line shown on widget row `y` (`0` = top).
    #[must_use]
    pub fn timestamp_at_row(&self, y: u32) -> Option<DateTime<Utc>> {
        let height = lock(&self.amplitude).height();
        if y >= height {
            return None;
        }
        let age = (height - 1 - y) as usize;
        let history = lock(&self.history);
        let index = history.lines.len().checked_sub(age + 1)?;
        history.lines.get(index).map(|(timestamp, _)| *timestamp)
    }

    /// Wheel zoom around the pointer's horizontal pixel position.
    pub fn wheel_zoom(&self, notches: i32, pointer_x: f64) -> bool {
        let (changed, animating) = {
            let mut zoom = lock(&self.zoom);
            let pointer_unit = zoom.pixel_to_unit(Axis::X, pointer_x);
            (zoom.wheel_zoom(Axis::X, notches, pointer_unit), zoom.is_animating())
        };
        self.after_zoom_change(changed, animating);
        changed
    }

    /// Rubber-band zoom; only the horizontal extent is used.
    pub fn zoom_to_pixel_rect(&self, rect: PixelRect) -> PlotResult<bool> {
        let (changed, animating) = {
            let mut zoom = lock(&self.zoom);
            (zoom.zoom_to_pixel_rect(rect)?, zoom.is_animating())
        };
        self.after_zoom_change(changed, animating);
        Ok(changed)
    }

    pub fn pan_by_pixels(&self, dx: f64) -> bool {
        let (changed, animating) = {
            let mut zoom = lock(&self.zoom);
            (zoom.pan_by_pixels(dx, 0.0), zoom.is_animating())
        };
        self.after_zoom_change(changed, animating);
        changed
    }

    pub fn set_cursor(&self, position: Option<(i32, i32)>, color: Argb) {
        lock(&self.decorations).set_cursor(position, color);
        self.redraw.request();
    }

    pub fn set_zoom_rect(&self, rect: Option<PixelRect>, color: Argb) {
        lock(&self.decorations).set_zoom_rect(rect, color);
        self.redraw.request();
    }

    pub fn set_range_markers(&self, ranges: Vec<(CoordinateRange, Argb)>) {
        lock(&self.decorations).set_range_markers(ranges);
        self.redraw.request();
    }

    pub fn set_grid(&self, grid: Option<GridLayer>) {
        lock(&self.decorations).grid = grid;
        self.redraw.request();
    }

    /// Copy of the amplitude image as currently drawn.
    #[must_use]
    pub fn amplitude_image(&self) -> Option<PixelSurface> {
        let amplitude = lock(&self.amplitude);
        amplitude.copy_region(PixelRect::new(0, 0, amplitude.width(), amplitude.height()))
    }

    fn after_zoom_change(&self, changed: bool, animating: bool) {
        if !changed {
            return;
        }
        if !animating {
            self.rerender_image();
        }
        self.redraw.request();
    }

    /// Redraws the amplitude image from history for the current horizontal view.
    fn rerender_image(&self) {
        let (visible, limits) = {
            let zoom = lock(&self.zoom);
            (zoom.destination().x, zoom.outer_limits().x)
        };
        let color_map = Arc::clone(&lock(&self.color_map));

        let mut history = lock(&self.history);
        let window = bin_window(visible, limits, history.bins);
        {
            let mut amplitude = lock(&self.amplitude);
            let (width, height) = (amplitude.width(), amplitude.height());
            amplitude.set_size_and_clear(width, height);
            let LineHistory { lines, row, .. } = &mut *history;
            row.resize(width as usize, Argb::TRANSPARENT);
            for (_, samples) in lines.iter() {
                color_map.map_line(samples, window.clone(), row);
                amplitude.scroll_up_with(row);
            }
        }
        register_overlay(&mut lock(&self.overlay), &window, history.bins);
        debug!(
            start = window.start,
            end = window.end,
            lines = history.lines.len(),
            "waterfall image re-rendered"
        );
    }
}

impl PlotWidget for WaterfallWidget {
    fn push_line(&self, timestamp: DateTime<Utc>, samples: &[f32]) -> PlotResult<()> {
        if samples.is_empty() {
            return Err(PlotError::InvalidData(
                "waterfall line has no samples".to_owned(),
            ));
        }
        let bins = u32::try_from(samples.len())
            .map_err(|_| PlotError::InvalidData("waterfall line is too long".to_owned()))?;
        let (visible, limits) = {
            let zoom = lock(&self.zoom);
            (zoom.destination().x, zoom.outer_limits().x)
        };
        let color_map = Arc::clone(&lock(&self.color_map));
        let window = bin_window(visible, limits, bins);

        let mut history = lock(&self.history);
        if history.bins != bins {
            debug!(old = history.bins, new = bins, "waterfall bin count changed");
            history.bins = bins;
            let mut overlay = lock(&self.overlay);
            overlay.set_reference_width(bins);
            register_overlay(&mut overlay, &window, bins);
        }
        history.push(timestamp, samples.to_vec());

        let mut amplitude = lock(&self.amplitude);
        let row = &mut history.row;
        row.resize(amplitude.width() as usize, Argb::TRANSPARENT);
        color_map.map_line(samples, window, row);
        amplitude.scroll_up_with(row);
        lock(&self.overlay).scroll_up();
        self.redraw.request();
        Ok(())
    }

    fn set_visible_range(&self, axis: Axis, min: f64, max: f64) -> PlotResult<bool> {
        let (changed, animating) = {
            let mut zoom = lock(&self.zoom);
            (zoom.set_visible_range(axis, min, max)?, zoom.is_animating())
        };
        self.after_zoom_change(changed, animating);
        Ok(changed)
    }

    fn zoom_to(&self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> PlotResult<bool> {
        let frame = ZoomFrame::from_bounds(x_min, x_max, y_min, y_max)?;
        let (changed, animating) = {
            let mut zoom = lock(&self.zoom);
            (zoom.zoom_in(frame)?, zoom.is_animating())
        };
        self.after_zoom_change(changed, animating);
        Ok(changed)
    }

    fn zoom_out(&self) -> PlotResult<bool> {
        let (changed, animating) = {
            let mut zoom = lock(&self.zoom);
            (zoom.zoom_out(), zoom.is_animating())
        };
        self.after_zoom_change(changed, animating);
        Ok(changed)
    }

    fn reset_zoom(&self) -> PlotResult<bool> {
        let (changed, animating) = {
            let mut zoom = lock(&self.zoom);
            (zoom.reset_zoom(), zoom.is_animating())
        };
        self.after_zoom_change(changed, animating);
        Ok(changed)
    }

    fn unit_to_pixel(&self, axis: Axis, value: f64) -> i32 {
        lock(&self.zoom).unit_to_pixel(axis, value)
    }

    fn pixel_to_unit(&self, axis: Axis, pixel: f64) -> f64 {
        lock(&self.zoom).pixel_to_unit(axis, pixel)
    }

    fn render_into(&self, target: &mut PixelSurface, clip: PixelRect, scratch: &mut ScratchArena) {
        if clip.is_empty() {
            warn!("waterfall render skipped: empty clip");
            return;
        }
        let (width, height) = {
            let amplitude = lock(&self.amplitude);
            (amplitude.width(), amplitude.height())
        };
        if (clip.width, clip.height) != (width, height) {
            warn!(
                clip_width = clip.width,
                clip_height = clip.height,
                width,
                height,
                "waterfall render skipped: clip does not match widget size"
            );
            return;
        }
        let (x, y) = {
            let zoom = lock(&self.zoom);
            (zoom.mapper(Axis::X), zoom.mapper(Axis::Y))
        };
        scratch.clear();
        let decorations = lock(&self.decorations).clone();
        let mut ctx = PaintContext {
            target,
            clip,
            x,
            y,
            scratch,
        };
        for kind in self.config.layer_order.iter() {
            match kind {
                LayerKind::Background => {
                    ctx.target.fill_rect(clip, self.config.background);
                }
                LayerKind::Image => lock(&self.amplitude).draw_image_clipped(
                    ctx.target,
                    clip.x,
                    clip.y,
                    clip,
                    BlendMode::Copy,
                ),
                LayerKind::Overlay => {
                    lock(&self.overlay).draw_image_to(ctx.target, clip.x, clip.y, clip);
                }
                other => decorations.paint(other, &mut ctx),
            }
        }
    }

    fn resize(&self, width: u32, height: u32) {
        let viewport = match Viewport::new(width, height).checked() {
            Ok(viewport) => viewport,
            Err(error) => {
                warn!(%error, "waterfall resize ignored");
                return;
            }
        };
        {
            let mut zoom = lock(&self.zoom);
            zoom.set_viewport(viewport);
            let limits = ZoomFrame::new(zoom.outer_limits().x, row_range(viewport.height));
            if let Err(error) = zoom.set_outer_limits(limits) {
                warn!(%error, "waterfall limits rejected on resize");
            }
        }
        {
            let mut history = lock(&self.history);
            history.set_capacity(viewport.height as usize);
            lock(&self.amplitude).set_size_and_clear(viewport.width, viewport.height);
            lock(&self.overlay).resize(viewport.width, viewport.height);
        }
        self.rerender_image();
        self.redraw.request();
    }

    fn tick(&self, delta_seconds: f64) -> AnimationStep {
        let step = lock(&self.zoom).tick(delta_seconds);
        match step {
            AnimationStep::Idle => {}
            AnimationStep::Moved(_) => self.redraw.request(),
            AnimationStep::Settled(_) => {
                self.rerender_image();
                self.redraw.request();
            }
        }
        step
    }

    fn take_redraw_request(&self) -> bool {
        self.redraw.take()
    }
}

/// Vertical unit range of a widget `height` rows tall.
fn row_range(height: u32) -> CoordinateRange {
    CoordinateRange {
        min: 0.0,
        max: f64::from(height.saturating_sub(1)),
    }
}

/// Points the overlay at the same bins as the amplitude rows.
fn register_overlay(overlay: &mut OverlayAlignmentLayer, window: &Range<usize>, bins: u32) {
    let full = *window == (0..bins as usize);
    let reference_window = (!full).then(|| (window.start as f64, window.end as f64));
    if let Err(error) = overlay.set_visible_reference_window(reference_window) {
        warn!(%error, "overlay window rejected");
    }
}

/// Bins covering the visible part of `limits`; never empty.
fn bin_window(visible: CoordinateRange, limits: CoordinateRange, bins: u32) -> Range<usize> {
    let count = f64::from(bins.max(1));
    if limits.is_degenerate() {
        return 0..bins.max(1) as usize;
    }
    let scale = count / limits.span();
    let start = ((visible.min - limits.min) * scale).floor().clamp(0.0, count - 1.0);
    let end = ((visible.max - limits.min) * scale).ceil().clamp(start + 1.0, count);
    start as usize..end as usize
}
