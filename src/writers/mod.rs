pub mod csv_writer;

pub use csv_writer::{read_dataset, DatasetWriter, Reservation, ReserveOutcome};
