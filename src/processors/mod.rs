pub mod backfill_driver;
pub mod normalizer;
pub mod year_collector;

pub use backfill_driver::{
    default_workers, BackfillDriver, RunReport, StationSummary, YearResult, YearStatus,
};
pub use normalizer::RecordNormalizer;
pub use year_collector::YearCollector;
