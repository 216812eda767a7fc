mod cache;
mod config;
mod line_graph;
mod waterfall;
mod widget;

pub use cache::{CacheStats, PrepareOutcome, SeriesDecimationCache};
pub use config::PlotConfig;
pub use line_graph::{LineGraphWidget, PRIMARY_SERIES_KEY};
pub use waterfall::WaterfallWidget;
pub use widget::{Decorations, PlotWidget};
