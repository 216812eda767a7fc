mod circular_buffer;
mod color_map;
mod layers;
mod overlay;
mod surface;

pub use circular_buffer::{BufferState, CircularPixelBuffer, SIZE_MISMATCH_REPORT_THRESHOLD};
pub use color_map::ColorMap;
pub use layers::{
    CursorLayer, GridLayer, LayerKind, LayerStack, PaintContext, PaintLayer, RangeMarkerLayer,
    ScratchArena, ZoomRectLayer, evenly_spaced_ticks,
};
pub use overlay::{OverlayAlignmentLayer, SpanMapping};
pub use surface::{Argb, BlendMode, PixelSurface};
