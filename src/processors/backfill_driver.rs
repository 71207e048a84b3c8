use crate::error::{BackfillError, Result};
use crate::models::{StationConfig, StationTable};
use crate::processors::YearCollector;
use crate::utils::constants::{DEFAULT_WORKER_LIMIT, MAX_WORKERS_CAP};
use crate::utils::progress::ProgressReporter;
use crate::writers::{DatasetWriter, ReserveOutcome};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum YearStatus {
    /// Collected and persisted in this run.
    Fetched,
    /// Dataset already on disk; nothing fetched.
    Skipped,
    /// Held by another worker or a stale lock.
    Locked,
    /// At least one month failed, or persisting failed; retried next run.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearResult {
    pub station: String,
    pub year: i32,
    pub status: YearStatus,
    pub observations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StationSummary {
    pub station: String,
    pub fetched: usize,
    pub skipped: usize,
    pub locked: usize,
    pub failed: usize,
    pub observations: usize,
    pub failed_years: Vec<i32>,
}

impl StationSummary {
    fn record(&mut self, result: &YearResult) {
        match result.status {
            YearStatus::Fetched => self.fetched += 1,
            YearStatus::Skipped => self.skipped += 1,
            YearStatus::Locked => self.locked += 1,
            YearStatus::Failed => {
                self.failed += 1;
                self.failed_years.push(result.year);
            }
        }
        self.observations += result.observations;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub current_year: i32,
    pub cutoff_year: i32,
    pub stations: Vec<StationSummary>,
}

impl RunReport {
    fn new(stations: &StationTable, current_year: i32, cutoff_year: i32) -> Self {
        Self {
            current_year,
            cutoff_year,
            stations: stations
                .iter()
                .map(|s| StationSummary {
                    station: s.name.clone(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    pub fn station(&self, name: &str) -> Option<&StationSummary> {
        self.stations.iter().find(|s| s.station == name)
    }

    pub fn total(&self, status: YearStatus) -> usize {
        self.stations
            .iter()
            .map(|s| match status {
                YearStatus::Fetched => s.fetched,
                YearStatus::Skipped => s.skipped,
                YearStatus::Locked => s.locked,
                YearStatus::Failed => s.failed,
            })
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        self.total(YearStatus::Failed) > 0
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "Backfill {}..={} summary\n{:<16} {:>8} {:>8} {:>8} {:>8} {:>12}\n",
            self.cutoff_year,
            self.current_year,
            "station",
            "fetched",
            "skipped",
            "failed",
            "locked",
            "observations"
        );
        for s in &self.stations {
            out.push_str(&format!(
                "{:<16} {:>8} {:>8} {:>8} {:>8} {:>12}\n",
                s.station, s.fetched, s.skipped, s.failed, s.locked, s.observations
            ));
            if !s.failed_years.is_empty() {
                let mut years = s.failed_years.clone();
                years.sort_unstable_by(|a, b| b.cmp(a));
                let listed: Vec<String> = years.iter().map(|y| y.to_string()).collect();
                out.push_str(&format!("  failed years: {}\n", listed.join(", ")));
            }
        }
        out
    }
}

/// Walks every station from the current year back to the cutoff, collecting
/// and persisting each (station, year) pair not already on disk.
pub struct BackfillDriver {
    collector: Arc<YearCollector>,
    writer: Arc<DatasetWriter>,
    max_workers: usize,
    allow_incomplete: bool,
    refresh_current_year: bool,
}

impl BackfillDriver {
    pub fn new(collector: Arc<YearCollector>, writer: Arc<DatasetWriter>) -> Self {
        Self {
            collector,
            writer,
            max_workers: default_workers(),
            allow_incomplete: false,
            refresh_current_year: false,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.clamp(1, MAX_WORKERS_CAP);
        self
    }

    /// Persist years even when some months failed. Those months then stay
    /// missing for good.
    pub fn with_allow_incomplete(mut self, allow_incomplete: bool) -> Self {
        self.allow_incomplete = allow_incomplete;
        self
    }

    /// Re-collect the current year even if its dataset exists.
    pub fn with_refresh_current_year(mut self, refresh: bool) -> Self {
        self.refresh_current_year = refresh;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub async fn run(
        &self,
        stations: &StationTable,
        current_year: i32,
        cutoff_year: i32,
        progress: Option<&ProgressReporter>,
    ) -> Result<RunReport> {
        if cutoff_year > current_year {
            return Err(BackfillError::InvalidYearRange {
                cutoff: cutoff_year,
                current: current_year,
            });
        }

        let jobs: Vec<(&StationConfig, i32)> = stations
            .iter()
            .flat_map(|station| {
                (cutoff_year..=current_year)
                    .rev()
                    .map(move |year| (station, year))
            })
            .collect();

        info!(
            stations = stations.len(),
            pairs = jobs.len(),
            workers = self.max_workers,
            "Starting backfill"
        );
        if let Some(p) = progress {
            p.set_message(&format!(
                "Backfilling {} stations, {}..={}",
                stations.len(),
                cutoff_year,
                current_year
            ));
        }

        let mut report = RunReport::new(stations, current_year, cutoff_year);
        let index: HashMap<String, usize> = report
            .stations
            .iter()
            .enumerate()
            .map(|(i, s)| (s.station.clone(), i))
            .collect();

        let mut results = stream::iter(jobs)
            .map(|(station, year)| self.process_pair(station, year, current_year))
            .buffer_unordered(self.max_workers);

        while let Some(result) = results.next().await {
            if let Some(&i) = index.get(&result.station) {
                report.stations[i].record(&result);
            }
            if let Some(p) = progress {
                match result.status {
                    YearStatus::Failed => p.println(&format!(
                        "{} {}: not persisted, will retry on the next run",
                        result.station, result.year
                    )),
                    YearStatus::Locked => p.println(&format!(
                        "{} {}: locked by another run",
                        result.station, result.year
                    )),
                    YearStatus::Fetched | YearStatus::Skipped => {}
                }
                p.increment(1);
            }
        }

        info!(
            fetched = report.total(YearStatus::Fetched),
            skipped = report.total(YearStatus::Skipped),
            failed = report.total(YearStatus::Failed),
            locked = report.total(YearStatus::Locked),
            "Backfill finished"
        );
        Ok(report)
    }

    /// Reserve, collect and persist one pair. Never aborts the run: every
    /// problem ends up as a status in the result.
    async fn process_pair(&self, station: &StationConfig, year: i32, current_year: i32) -> YearResult {
        let result = |status, observations| YearResult {
            station: station.name.clone(),
            year,
            status,
            observations,
        };

        let refresh = self.refresh_current_year && year == current_year;
        let reserved = if refresh {
            self.writer.reserve_for_refresh(&station.name, year)
        } else {
            self.writer.reserve(&station.name, year)
        };

        let reservation = match reserved {
            Ok(ReserveOutcome::Reserved(reservation)) => reservation,
            Ok(ReserveOutcome::AlreadyPresent) => {
                debug!(station = %station.name, year, "Already on disk");
                return result(YearStatus::Skipped, 0);
            }
            Ok(ReserveOutcome::Locked) => {
                warn!(
                    station = %station.name,
                    year,
                    "Lock file present; another run may be active (use --clear-locks after a crash)"
                );
                return result(YearStatus::Locked, 0);
            }
            Err(e) => {
                error!(station = %station.name, year, error = %e, "Could not reserve dataset");
                return result(YearStatus::Failed, 0);
            }
        };

        let collection = self.collector.collect(station, year).await;
        if !collection.is_complete() && !self.allow_incomplete {
            warn!(
                station = %station.name,
                year,
                failed_months = ?collection.failed_months(),
                "Not persisting incomplete year"
            );
            return result(YearStatus::Failed, 0);
        }

        let observations = collection.dataset.len();
        let writer = Arc::clone(&self.writer);
        let written = tokio::task::spawn_blocking(move || {
            writer.write(&reservation, &collection.dataset)
        })
        .await;

        match written {
            Ok(Ok(_)) => result(YearStatus::Fetched, observations),
            Ok(Err(e)) => {
                error!(station = %station.name, year, error = %e, "Failed to write dataset");
                result(YearStatus::Failed, 0)
            }
            Err(e) => {
                error!(station = %station.name, year, error = %e, "Write task failed");
                result(YearStatus::Failed, 0)
            }
        }
    }
}

/// Conservative default: the remote site publishes no rate limit.
pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, DEFAULT_WORKER_LIMIT)
}
