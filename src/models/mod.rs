pub mod observation;
pub mod station;

pub use observation::{
    DailyObservation, DatasetRow, FailureKind, MonthOutcome, Value, YearCollection, YearDataset,
};
pub use station::{builtin_stations, StationConfig, StationTable};
