pub mod constants;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use filename::{dataset_file_name, lock_path_for, parse_dataset_year};
pub use progress::ProgressReporter;
