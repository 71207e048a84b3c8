pub mod station_series;

pub use station_series::{StationSeries, StationSeriesLoader, TemperatureExtremes};
