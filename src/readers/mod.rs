pub mod page_fetcher;
pub mod station_reader;
pub mod table_parser;

pub use page_fetcher::{HttpPageFetcher, PageFetcher, PageRequest, RetryPolicy};
pub use station_reader::StationReader;
pub use table_parser::{RawRow, TableParser};
