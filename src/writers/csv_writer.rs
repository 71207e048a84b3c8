use crate::error::Result;
use crate::models::{DailyObservation, DatasetRow, YearDataset};
use crate::utils::constants::DATASET_HEADER;
use crate::utils::filename::{dataset_file_name, lock_path_for, parse_dataset_year};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Result of trying to claim a (station, year) pair for writing.
#[derive(Debug)]
pub enum ReserveOutcome {
    Reserved(Reservation),
    /// The dataset file already exists.
    AlreadyPresent,
    /// Another worker or process holds the lock file.
    Locked,
}

/// Exclusive claim on a (station, year) pair; the lock file is removed on drop.
#[derive(Debug)]
pub struct Reservation {
    station: String,
    year: i32,
    lock_path: PathBuf,
}

impl Reservation {
    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn year(&self) -> i32 {
        self.year
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(lock = %self.lock_path.display(), error = %e, "Failed to release lock");
            }
        }
    }
}

/// Persists one CSV file per (station, year).
///
/// File existence is the idempotency key, so files only ever appear through
/// a rename of a fully written temporary file.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    output_dir: PathBuf,
}

impl DatasetWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn dataset_path(&self, station: &str, year: i32) -> PathBuf {
        self.output_dir.join(dataset_file_name(station, year))
    }

    pub fn exists(&self, station: &str, year: i32) -> bool {
        self.dataset_path(station, year).is_file()
    }

    /// Check for an existing dataset, then claim the pair with a lock file
    /// created exclusively.
    pub fn reserve(&self, station: &str, year: i32) -> Result<ReserveOutcome> {
        if self.exists(station, year) {
            return Ok(ReserveOutcome::AlreadyPresent);
        }
        match self.lock(station, year)? {
            // The dataset may have landed between the existence check and the lock.
            ReserveOutcome::Reserved(reservation) if self.exists(station, year) => {
                drop(reservation);
                Ok(ReserveOutcome::AlreadyPresent)
            }
            outcome => Ok(outcome),
        }
    }

    /// Claim the pair even if a dataset exists, for rewriting it.
    pub fn reserve_for_refresh(&self, station: &str, year: i32) -> Result<ReserveOutcome> {
        self.lock(station, year)
    }

    fn lock(&self, station: &str, year: i32) -> Result<ReserveOutcome> {
        fs::create_dir_all(&self.output_dir)?;
        let lock_path = lock_path_for(&self.dataset_path(station, year));

        match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(mut file) => {
                stamp_lock(&mut file, &lock_path)?;
                let reservation = Reservation {
                    station: station.to_string(),
                    year,
                    lock_path,
                };
                Ok(ReserveOutcome::Reserved(reservation))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(station, year, lock = %lock_path.display(), "Pair is locked");
                Ok(ReserveOutcome::Locked)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the dataset for a reserved pair: header, one row per
    /// observation, missing values as empty fields.
    pub fn write(&self, reservation: &Reservation, dataset: &YearDataset) -> Result<PathBuf> {
        let final_path = self.dataset_path(reservation.station(), reservation.year());

        let temp_file = NamedTempFile::new_in(&self.output_dir)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(temp_file.as_file());
            writer.write_record(DATASET_HEADER)?;
            for observation in &dataset.observations {
                writer.serialize(DatasetRow::from(observation))?;
            }
            writer.flush()?;
        }
        temp_file.as_file().sync_all()?;
        temp_file.persist(&final_path).map_err(|e| e.error)?;

        info!(
            station = reservation.station(),
            year = reservation.year(),
            rows = dataset.len(),
            path = %final_path.display(),
            "Dataset written"
        );
        Ok(final_path)
    }

    /// Remove lock files left behind by an interrupted run.
    pub fn clear_locks(&self) -> Result<usize> {
        if !self.output_dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == crate::utils::LOCK_EXTENSION) {
                fs::remove_file(&path)?;
                warn!(lock = %path.display(), "Removed stale lock");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Dataset files of a station as `(year, path)`, ordered by file name.
    pub fn list_station_files(&self, station: &str) -> Result<Vec<(i32, PathBuf)>> {
        if !self.output_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            match parse_dataset_year(&file_name, station) {
                Ok(Some(year)) => files.push((file_name, year, entry.path())),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Ignoring unrecognised file"),
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files.into_iter().map(|(_, year, path)| (year, path)).collect())
    }
}

/// Record the owning pid in a freshly created lock. On failure the lock is
/// removed, since no reservation will exist to release it.
fn stamp_lock(file: &mut impl Write, lock_path: &Path) -> Result<()> {
    if let Err(e) = writeln!(file, "{}", std::process::id()).and_then(|_| file.flush()) {
        if let Err(remove_err) = fs::remove_file(lock_path) {
            warn!(lock = %lock_path.display(), error = %remove_err, "Could not remove unstamped lock");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Read a persisted dataset back into observations.
pub fn read_dataset(path: &Path) -> Result<Vec<DailyObservation>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    reader
        .deserialize::<DatasetRow>()
        .map(|row| row.map(DailyObservation::from).map_err(Into::into))
        .collect()
}
