pub mod decimation;
pub mod mapper;
pub mod series;
pub mod types;

pub use decimation::{ProjectedPolyline, ProjectionPath};
pub use mapper::{AxisMapper, MapDirection, pixel_to_unit, unit_to_pixel};
pub use series::{SampleSeries, UniformSeries, WideXySeries, XySeries};
pub use types::{Axis, CoordinateRange, PixelRect, Viewport, ZoomFrame};
