use serde::{Deserialize, Serialize};

use crate::core::{AxisMapper, CoordinateRange, PixelRect};
use crate::error::{PlotError, PlotResult};
use crate::render::surface::{Argb, PixelSurface};

const GRID_TARGET_SPACING_PX: f64 = 64.0;
const GRID_MIN_LINES: usize = 2;
const GRID_MAX_LINES: usize = 24;

/// Paint layers a widget composes, back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Background,
    Grid,
    /// Primary scrolling image (waterfall amplitude).
    Image,
    /// Detection marks registered with the primary image.
    Overlay,
    Series,
    RangeMarkers,
    ZoomRect,
    Cursor,
}

impl LayerKind {
    pub const ALL: [Self; 8] = [
        Self::Background,
        Self::Grid,
        Self::Image,
        Self::Overlay,
        Self::Series,
        Self::RangeMarkers,
        Self::ZoomRect,
        Self::Cursor,
    ];
}

/// Ordered set of layers; each kind appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LayerKind>", into = "Vec<LayerKind>")]
pub struct LayerStack {
    layers: Vec<LayerKind>,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::canonical()
    }
}

impl LayerStack {
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            layers: LayerKind::ALL.to_vec(),
        }
    }

    /// Builds a custom order. Kinds left out are not painted.
    pub fn from_order(layers: Vec<LayerKind>) -> PlotResult<Self> {
        for (index, kind) in layers.iter().enumerate() {
            if layers[..index].contains(kind) {
                return Err(PlotError::InvalidData(format!(
                    "layer {kind:?} listed more than once"
                )));
            }
        }
        Ok(Self { layers })
    }

    #[must_use]
    pub fn layers(&self) -> &[LayerKind] {
        &self.layers
    }

    #[must_use]
    pub fn contains(&self, kind: LayerKind) -> bool {
        self.layers.contains(&kind)
    }

    #[must_use]
    pub fn position(&self, kind: LayerKind) -> Option<usize> {
        self.layers.iter().position(|layer| *layer == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = LayerKind> + '_ {
        self.layers.iter().copied()
    }
}

impl TryFrom<Vec<LayerKind>> for LayerStack {
    type Error = PlotError;

    fn try_from(layers: Vec<LayerKind>) -> Result<Self, Self::Error> {
        Self::from_order(layers)
    }
}

impl From<LayerStack> for Vec<LayerKind> {
    fn from(stack: LayerStack) -> Self {
        stack.layers
    }
}

/// Reusable per-frame buffers, kept by the caller between frames.
#[derive(Debug, Default)]
pub struct ScratchArena {
    pub row: Vec<Argb>,
    pub ticks: Vec<f64>,
    pub x_pixels: Vec<i32>,
    pub y_pixels: Vec<i32>,
}

impl ScratchArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.row.clear();
        self.ticks.clear();
        self.x_pixels.clear();
        self.y_pixels.clear();
    }
}

/// Target and coordinate system shared by every layer of one frame.
///
/// `x` and `y` map units into the plot area, whose origin is the clip's
/// top-left corner.
pub struct PaintContext<'a> {
    pub target: &'a mut PixelSurface,
    pub clip: PixelRect,
    pub x: AxisMapper,
    pub y: AxisMapper,
    pub scratch: &'a mut ScratchArena,
}

impl PaintContext<'_> {
    #[must_use]
    pub fn plot_x(&self, value: f64) -> i32 {
        self.clip.x + self.x.to_pixel(value)
    }

    #[must_use]
    pub fn plot_y(&self, value: f64) -> i32 {
        self.clip.y + self.y.to_pixel(value)
    }
}

pub trait PaintLayer {
    fn kind(&self) -> LayerKind;

    fn paint(&self, ctx: &mut PaintContext<'_>);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayer {
    pub color: Argb,
    pub target_spacing_px: f64,
}

impl Default for GridLayer {
    fn default() -> Self {
        Self {
            color: Argb::argb(0x40, 0x80, 0x80, 0x80),
            target_spacing_px: GRID_TARGET_SPACING_PX,
        }
    }
}

impl PaintLayer for GridLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Grid
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        let clip = ctx.clip;
        let count = grid_line_count(f64::from(clip.width), self.target_spacing_px);
        evenly_spaced_ticks(ctx.x.units(), count, &mut ctx.scratch.ticks);
        for index in 0..ctx.scratch.ticks.len() {
            let x = ctx.plot_x(ctx.scratch.ticks[index]);
            ctx.target
                .draw_vline(x, clip.y, clip.bottom() - 1, self.color, clip);
        }

        let count = grid_line_count(f64::from(clip.height), self.target_spacing_px);
        evenly_spaced_ticks(ctx.y.units(), count, &mut ctx.scratch.ticks);
        for index in 0..ctx.scratch.ticks.len() {
            let y = ctx.plot_y(ctx.scratch.ticks[index]);
            ctx.target
                .draw_hline(clip.x, clip.right() - 1, y, self.color, clip);
        }
    }
}

fn grid_line_count(span_px: f64, target_spacing_px: f64) -> usize {
    if !target_spacing_px.is_finite() || target_spacing_px <= 0.0 {
        return GRID_MIN_LINES;
    }
    let raw = (span_px / target_spacing_px).floor() as usize + 1;
    raw.clamp(GRID_MIN_LINES, GRID_MAX_LINES)
}

/// Fills `out` with `count` values spread evenly over `range`, ends included.
pub fn evenly_spaced_ticks(range: CoordinateRange, count: usize, out: &mut Vec<f64>) {
    out.clear();
    match count {
        0 => {}
        1 => out.push(range.min),
        _ => {
            let denominator = (count - 1) as f64;
            out.extend((0..count).map(|index| range.min + range.span() * index as f64 / denominator));
        }
    }
}

/// Crosshair at the pointer position, in target pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorLayer {
    pub position: Option<(i32, i32)>,
    pub color: Argb,
}

impl PaintLayer for CursorLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Cursor
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        let Some((x, y)) = self.position else {
            return;
        };
        let clip = ctx.clip;
        if !clip.contains(x, y) {
            return;
        }
        ctx.target
            .draw_vline(x, clip.y, clip.bottom() - 1, self.color, clip);
        ctx.target
            .draw_hline(clip.x, clip.right() - 1, y, self.color, clip);
    }
}

/// Rubber band shown while the user drags out a zoom rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoomRectLayer {
    pub rect: Option<PixelRect>,
    pub color: Argb,
}

impl PaintLayer for ZoomRectLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::ZoomRect
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        if let Some(rect) = self.rect {
            ctx.target.stroke_rect(rect, self.color, ctx.clip);
        }
    }
}

/// Vertical markers bounding horizontal unit ranges (e.g. a tuned band).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeMarkerLayer {
    pub ranges: Vec<(CoordinateRange, Argb)>,
}

impl PaintLayer for RangeMarkerLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::RangeMarkers
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        let clip = ctx.clip;
        let visible = ctx.x.units();
        for (range, color) in &self.ranges {
            if range.max < visible.min || range.min > visible.max {
                continue;
            }
            for edge in [range.min, range.max] {
                if visible.contains(edge) {
                    let x = ctx.plot_x(edge);
                    ctx.target
                        .draw_vline(x, clip.y, clip.bottom() - 1, *color, clip);
                }
            }
        }
    }
}
