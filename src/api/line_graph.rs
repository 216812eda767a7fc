use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::core::{Axis, CoordinateRange, PixelRect, SampleSeries, UniformSeries, Viewport, ZoomFrame};
use crate::error::{PlotError, PlotResult};
use crate::interaction::{AnimationStep, ZoomAxes, ZoomController, ZoomListener};
use crate::render::{Argb, GridLayer, LayerKind, PaintContext, PixelSurface, ScratchArena};

use super::cache::{CacheStats, SeriesDecimationCache};
use super::config::PlotConfig;
use super::widget::{Decorations, PlotWidget, RedrawFlag, lock};

/// Key of the trace replaced by [`PlotWidget::push_line`].
pub const PRIMARY_SERIES_KEY: &str = "primary";

#[derive(Clone)]
struct SeriesEntry {
    series: Arc<dyn SampleSeries>,
    color: Argb,
    cache: Arc<SeriesDecimationCache>,
}

/// Two-axis zoomable graph of one or more sample series.
///
/// Series are painted in insertion order, each through its own decimation
/// cache. Rendering copies the series list and the decorations out of their
/// locks before painting, so producers are only blocked for the copy. No
/// lock is held while taking another.
pub struct LineGraphWidget {
    config: PlotConfig,
    primary_color: Argb,
    series: Mutex<IndexMap<String, SeriesEntry>>,
    last_update: Mutex<Option<DateTime<Utc>>>,
    zoom: Mutex<ZoomController>,
    decorations: Mutex<Decorations>,
    redraw: RedrawFlag,
}

impl std::fmt::Debug for LineGraphWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineGraphWidget")
            .field("config", &self.config)
            .field("series", &self.series_keys())
            .field("zoom", &self.zoom)
            .finish_non_exhaustive()
    }
}

impl LineGraphWidget {
    pub fn new(limits: ZoomFrame, viewport: Viewport, config: PlotConfig) -> PlotResult<Self> {
        config.validate()?;
        let viewport = viewport.checked()?;
        let zoom = ZoomController::new(limits, viewport, ZoomAxes::Both, config.zoom_config())?;
        Ok(Self {
            config,
            primary_color: Argb::GREEN,
            series: Mutex::new(IndexMap::new()),
            last_update: Mutex::new(None),
            zoom: Mutex::new(zoom),
            decorations: Mutex::new(Decorations::default()),
            redraw: RedrawFlag::default(),
        })
    }

    #[must_use]
    pub fn with_primary_color(mut self, color: Argb) -> Self {
        self.primary_color = color;
        self
    }

    #[must_use]
    pub fn config(&self) -> &PlotConfig {
        &self.config
    }

    /// Adds or replaces the series stored under `key`.
    ///
    /// A replaced series keeps its position and its cache, which is invalidated.
    pub fn set_series(&self, key: impl Into<String>, series: Arc<dyn SampleSeries>, color: Argb) {
        let key = key.into();
        let mut entries = lock(&self.series);
        if let Some(entry) = entries.get_mut(&key) {
            entry.series = series;
            entry.color = color;
            entry.cache.invalidate();
        } else {
            debug!(key = %key, len = series.len(), "series added");
            entries.insert(
                key,
                SeriesEntry {
                    series,
                    color,
                    cache: Arc::new(SeriesDecimationCache::new(self.config.decimation_threshold)),
                },
            );
        }
        drop(entries);
        self.redraw.request();
    }

    pub fn remove_series(&self, key: &str) -> PlotResult<()> {
        lock(&self.series)
            .shift_remove(key)
            .ok_or_else(|| PlotError::UnknownSeries(key.to_owned()))?;
        self.redraw.request();
        Ok(())
    }

    /// Removes the series at the given insertion-order positions.
    ///
    /// `indices` must be strictly ascending and in range; otherwise nothing is
    /// removed.
    pub fn remove_series_batch(&self, indices: &[usize]) -> PlotResult<usize> {
        if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(PlotError::InvalidBatch(
                "series indices must be sorted ascending without duplicates".to_owned(),
            ));
        }
        let mut entries = lock(&self.series);
        if let Some(last) = indices.last() {
            if *last >= entries.len() {
                return Err(PlotError::InvalidBatch(format!(
                    "series index {last} out of range for {} series",
                    entries.len()
                )));
            }
        }
        for index in indices.iter().rev() {
            entries.shift_remove_index(*index);
        }
        drop(entries);
        if !indices.is_empty() {
            self.redraw.request();
        }
        Ok(indices.len())
    }

    #[must_use]
    pub fn series_keys(&self) -> Vec<String> {
        lock(&self.series).keys().cloned().collect()
    }

    /// Marks a series' data as changed in place.
    pub fn invalidate_series(&self, key: &str) -> PlotResult<()> {
        lock(&self.series)
            .get(key)
            .ok_or_else(|| PlotError::UnknownSeries(key.to_owned()))?
            .cache
            .invalidate();
        self.redraw.request();
        Ok(())
    }

    pub fn cache_stats(&self, key: &str) -> PlotResult<CacheStats> {
        lock(&self.series)
            .get(key)
            .map(|entry| entry.cache.stats())
            .ok_or_else(|| PlotError::UnknownSeries(key.to_owned()))
    }

    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_update)
    }

    /// Replaces the outer zoom limits.
    pub fn set_axis_limits(&self, limits: ZoomFrame) -> PlotResult<()> {
        lock(&self.zoom).set_outer_limits(limits)?;
        self.redraw.request();
        Ok(())
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

    /// Wheel zoom on one axis around a pointer position in widget pixels.
    pub fn wheel_zoom(&self, axis: Axis, notches: i32, pointer: f64) -> bool {
        let changed = {
            let mut zoom = lock(&self.zoom);
            let pointer_unit = zoom.pixel_to_unit(axis, pointer);
            zoom.wheel_zoom(axis, notches, pointer_unit)
        };
        self.request_if(changed)
    }

    pub fn zoom_to_pixel_rect(&self, rect: PixelRect) -> PlotResult<bool> {
        let changed = lock(&self.zoom).zoom_to_pixel_rect(rect)?;
        Ok(self.request_if(changed))
    }

    pub fn pan_by_pixels(&self, dx: f64, dy: f64) -> bool {
        let changed = lock(&self.zoom).pan_by_pixels(dx, dy);
        self.request_if(changed)
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

    fn request_if(&self, changed: bool) -> bool {
        if changed {
            self.redraw.request();
        }
        changed
    }

    fn paint_series(&self, ctx: &mut PaintContext<'_>, viewport: Viewport) {
        let entries: Vec<(String, SeriesEntry)> = lock(&self.series)
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        let (x_range, y_range) = (ctx.x.units(), ctx.y.units());
        for (key, entry) in &entries {
            if let Err(error) = entry
                .cache
                .prepare(entry.series.as_ref(), viewport, x_range, y_range)
            {
                warn!(key = %key, %error, "series skipped this frame");
                continue;
            }
            entry.cache.render(ctx.target, ctx.clip, entry.color);
        }
    }
}

impl PlotWidget for LineGraphWidget {
    /// Replaces the primary trace with `samples` spread evenly over the x limits.
    fn push_line(&self, timestamp: DateTime<Utc>, samples: &[f32]) -> PlotResult<()> {
        if samples.is_empty() {
            return Err(PlotError::InvalidData("line has no samples".to_owned()));
        }
        let limits = lock(&self.zoom).outer_limits().x;
        let step = if samples.len() > 1 && !limits.is_degenerate() {
            limits.span() / (samples.len() - 1) as f64
        } else {
            1.0
        };
        let series = UniformSeries::new(limits.min, step, samples.to_vec())?;
        self.set_series(PRIMARY_SERIES_KEY, Arc::new(series), self.primary_color);
        *lock(&self.last_update) = Some(timestamp);
        Ok(())
    }

    fn set_visible_range(&self, axis: Axis, min: f64, max: f64) -> PlotResult<bool> {
        let changed = lock(&self.zoom).set_visible_range(axis, min, max)?;
        Ok(self.request_if(changed))
    }

    fn zoom_to(&self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> PlotResult<bool> {
        let frame = ZoomFrame::from_bounds(x_min, x_max, y_min, y_max)?;
        let changed = lock(&self.zoom).zoom_in(frame)?;
        Ok(self.request_if(changed))
    }

    fn zoom_out(&self) -> PlotResult<bool> {
        let changed = lock(&self.zoom).zoom_out();
        Ok(self.request_if(changed))
    }

    fn reset_zoom(&self) -> PlotResult<bool> {
        let changed = lock(&self.zoom).reset_zoom();
        Ok(self.request_if(changed))
    }

    fn unit_to_pixel(&self, axis: Axis, value: f64) -> i32 {
        lock(&self.zoom).unit_to_pixel(axis, value)
    }

    fn pixel_to_unit(&self, axis: Axis, pixel: f64) -> f64 {
        lock(&self.zoom).pixel_to_unit(axis, pixel)
    }

    fn render_into(&self, target: &mut PixelSurface, clip: PixelRect, scratch: &mut ScratchArena) {
        if clip.is_empty() {
            warn!("line graph render skipped: empty clip");
            return;
        }
        let viewport = Viewport::new(clip.width, clip.height);
        let (x, y) = {
            let mut zoom = lock(&self.zoom);
            if zoom.viewport() != viewport {
                zoom.set_viewport(viewport);
            }
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
                LayerKind::Background => ctx.target.fill_rect(clip, self.config.background),
                LayerKind::Series => self.paint_series(&mut ctx, viewport),
                other => decorations.paint(other, &mut ctx),
            }
        }
    }

    fn resize(&self, width: u32, height: u32) {
        match Viewport::new(width, height).checked() {
            Ok(viewport) => lock(&self.zoom).set_viewport(viewport),
            Err(error) => {
                warn!(%error, "line graph resize ignored");
                return;
            }
        }
        self.redraw.request();
    }

    fn tick(&self, delta_seconds: f64) -> AnimationStep {
        let step = lock(&self.zoom).tick(delta_seconds);
        if step.changed() {
            self.redraw.request();
        }
        step
    }

    fn take_redraw_request(&self) -> bool {
        self.redraw.take()
    }
}
