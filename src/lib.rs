//! scrollplot: real-time scrolling and zooming plot-rendering core.
//!
//! The crate provides the pieces shared by a waterfall widget and a
//! line-graph widget: a wrap-around pixel buffer that scrolls in O(1), linear
//! unit/pixel mapping, min/max decimation of long series, an animated zoom
//! controller with history, and an overlay kept registered with the primary
//! image. Drawing goes into plain ARGB surfaces; hosts blit those wherever
//! they like.

pub mod api;
pub mod core;
pub mod error;
pub mod interaction;
pub mod render;
pub mod telemetry;

pub use api::{LineGraphWidget, PlotConfig, PlotWidget, SeriesDecimationCache, WaterfallWidget};
pub use error::{PlotError, PlotResult};
