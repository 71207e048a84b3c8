use crate::error::{BackfillError, Result};
use crate::models::{
    DailyObservation, FailureKind, MonthOutcome, StationConfig, YearCollection, YearDataset,
};
use crate::processors::RecordNormalizer;
use crate::readers::{PageFetcher, PageRequest, TableParser};
use crate::utils::constants::MONTHS_PER_YEAR;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collects a full calendar year of observations for one station, one
/// month page at a time.
pub struct YearCollector {
    fetcher: Arc<dyn PageFetcher>,
    parser: TableParser,
    normalizer: RecordNormalizer,
}

impl YearCollector {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Ok(Self {
            fetcher,
            parser: TableParser::new()?,
            normalizer: RecordNormalizer::new(),
        })
    }

    /// Collect months 1..=12 in order. A failing month contributes nothing
    /// and is recorded in the returned outcomes; the remaining months are
    /// still collected.
    pub async fn collect(&self, station: &StationConfig, year: i32) -> YearCollection {
        let mut dataset = YearDataset::new(station.name.clone(), year);
        let mut months = Vec::with_capacity(MONTHS_PER_YEAR as usize);

        for month in 1..=MONTHS_PER_YEAR {
            let outcome = match self.collect_month(station, year, month).await {
                Ok(Some(observations)) if observations.is_empty() => {
                    debug!(station = %station.name, year, month, "Observation table has no data rows");
                    MonthOutcome::EmptyTable
                }
                Ok(Some(observations)) => {
                    let count = observations.len();
                    dataset.extend(observations);
                    MonthOutcome::Rows(count)
                }
                Ok(None) => {
                    debug!(station = %station.name, year, month, "No observation table published");
                    MonthOutcome::NoTable
                }
                Err(e) => Self::failure(station, year, month, e),
            };
            months.push(outcome);
        }

        let collection = YearCollection { dataset, months };
        if collection.is_complete() {
            info!(
                station = %station.name,
                year,
                observations = collection.dataset.len(),
                missing_values = collection.dataset.missing_value_count(),
                "Collected year"
            );
        } else {
            warn!(
                station = %station.name,
                year,
                failed_months = ?collection.failed_months(),
                "Year collected with failed months"
            );
        }
        collection
    }

    /// `Ok(None)` when the page has no observation table.
    async fn collect_month(
        &self,
        station: &StationConfig,
        year: i32,
        month: u32,
    ) -> Result<Option<Vec<DailyObservation>>> {
        let request = PageRequest::new(station, year, month);
        let markup = self.fetcher.fetch(&request).await?;

        match self.parser.parse(&markup)? {
            Some(rows) => self.normalizer.normalize_month(&rows, year, month).map(Some),
            None => Ok(None),
        }
    }

    fn failure(station: &StationConfig, year: i32, month: u32, e: BackfillError) -> MonthOutcome {
        let kind = if e.is_parse_fault() {
            error!(
                station = %station.name,
                year,
                month,
                error = %e,
                "Observation table structure not recognised; skipping month"
            );
            FailureKind::ParseFault
        } else {
            warn!(
                station = %station.name,
                year,
                month,
                error = %e,
                "Failed to fetch month; skipping"
            );
            FailureKind::Transport
        };

        MonthOutcome::Failed {
            kind,
            message: e.to_string(),
        }
    }
}
