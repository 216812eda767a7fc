use thiserror::Error;

pub type PlotResult<T> = Result<T, PlotError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlotError {
    #[error("invalid range on {axis} axis: min={min}, max={max}")]
    InvalidRange {
        axis: &'static str,
        min: f64,
        max: f64,
    },

    #[error("invalid viewport size: width={width}, height={height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid batch operation: {0}")]
    InvalidBatch(String),

    #[error("decimation cache rebuild requested while the same cache is already rebuilding")]
    ReentrantRebuild,

    #[error("unknown series `{0}`")]
    UnknownSeries(String),
}
