pub mod time_series;
pub mod timeframe;

pub use time_series::{Candle, Feature, TimeRange, TimeSeriesBuffer};
pub use timeframe::Timeframe;
