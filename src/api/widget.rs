use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::core::{Axis, CoordinateRange, PixelRect};
use crate::error::PlotResult;
use crate::interaction::AnimationStep;
use crate::render::{
    Argb, CursorLayer, GridLayer, LayerKind, PaintContext, PaintLayer, PixelSurface,
    RangeMarkerLayer, ScratchArena, ZoomRectLayer,
};

/// Contract shared by the scrolling plot widgets.
///
/// Every method takes `&self`: widgets are shared through `Arc` between
/// producer threads pushing data and the thread that renders.
pub trait PlotWidget: Send + Sync {
    /// Appends one line of samples captured at `timestamp`.
    fn push_line(&self, timestamp: DateTime<Utc>, samples: &[f32]) -> PlotResult<()>;

    /// Shows `[min, max]` on one axis immediately.
    fn set_visible_range(&self, axis: Axis, min: f64, max: f64) -> PlotResult<bool>;

    /// Animated zoom to a unit-space rectangle; the previous view is kept for `zoom_out`.
    fn zoom_to(&self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> PlotResult<bool>;

    fn zoom_out(&self) -> PlotResult<bool>;

    fn reset_zoom(&self) -> PlotResult<bool>;

    fn unit_to_pixel(&self, axis: Axis, value: f64) -> i32;

    fn pixel_to_unit(&self, axis: Axis, pixel: f64) -> f64;

    /// Paints the widget into `clip`, whose top-left corner is the plot origin.
    ///
    /// Never fails: problems are logged and the frame is skipped.
    fn render_into(&self, target: &mut PixelSurface, clip: PixelRect, scratch: &mut ScratchArena);

    fn resize(&self, width: u32, height: u32);

    fn tick(&self, delta_seconds: f64) -> AnimationStep;

    /// Returns whether a redraw was requested since the last call, clearing the request.
    fn take_redraw_request(&self) -> bool;
}

#[derive(Debug, Default)]
pub(crate) struct RedrawFlag(AtomicBool);

impl RedrawFlag {
    pub(crate) fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub(crate) fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Overlays painted above the data layers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decorations {
    pub grid: Option<GridLayer>,
    pub cursor: CursorLayer,
    pub zoom_rect: ZoomRectLayer,
    pub range_markers: RangeMarkerLayer,
}

impl Decorations {
    pub(crate) fn set_cursor(&mut self, position: Option<(i32, i32)>, color: Argb) {
        self.cursor = CursorLayer { position, color };
    }

    pub(crate) fn set_zoom_rect(&mut self, rect: Option<PixelRect>, color: Argb) {
        self.zoom_rect = ZoomRectLayer { rect, color };
    }

    pub(crate) fn set_range_markers(&mut self, ranges: Vec<(CoordinateRange, Argb)>) {
        self.range_markers = RangeMarkerLayer { ranges };
    }

    /// Paints the decoration for `kind`; data layers are left to the widget.
    pub(crate) fn paint(&self, kind: LayerKind, ctx: &mut PaintContext<'_>) {
        match kind {
            LayerKind::Grid => {
                if let Some(grid) = &self.grid {
                    grid.paint(ctx);
                }
            }
            LayerKind::Cursor => self.cursor.paint(ctx),
            LayerKind::ZoomRect => self.zoom_rect.paint(ctx),
            LayerKind::RangeMarkers => self.range_markers.paint(ctx),
            LayerKind::Background | LayerKind::Image | LayerKind::Overlay | LayerKind::Series => {}
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
