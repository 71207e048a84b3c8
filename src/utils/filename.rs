use crate::error::{BackfillError, Result};
use crate::utils::constants::{DATASET_EXTENSION, LOCK_EXTENSION};
use std::path::{Path, PathBuf};

/// Dataset file name for a (station, year) pair: `{station}_{year}.csv`
pub fn dataset_file_name(station: &str, year: i32) -> String {
    format!("{}_{}.{}", station, year, DATASET_EXTENSION)
}

/// Lock file guarding an in-progress write of the dataset at `dataset_path`
pub fn lock_path_for(dataset_path: &Path) -> PathBuf {
    let mut name = dataset_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(LOCK_EXTENSION);
    dataset_path.with_file_name(name)
}

/// Extract the year from a dataset file name belonging to `station`.
///
/// Returns `Ok(None)` for files of other stations and unrelated files.
pub fn parse_dataset_year(file_name: &str, station: &str) -> Result<Option<i32>> {
    let Some(rest) = file_name
        .strip_prefix(station)
        .and_then(|s| s.strip_prefix('_'))
    else {
        return Ok(None);
    };

    let Some(year_part) = rest
        .strip_suffix(DATASET_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
    else {
        return Ok(None);
    };

    // "Tokyo_west_2020.csv" must not be taken as a "Tokyo" file
    if year_part.is_empty() || !year_part.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return Ok(None);
    }

    year_part
        .parse::<i32>()
        .map(Some)
        .map_err(|_| BackfillError::InvalidFileName(file_name.to_string()))
}
