use crate::error::Result;
use crate::models::DailyObservation;
use crate::writers::{read_dataset, DatasetWriter};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::fmt::Write as _;

/// A station's dense daily series as downstream consumers see it: every
/// persisted year concatenated in file-name order, rows with any missing
/// field dropped.
#[derive(Debug, Clone)]
pub struct StationSeries {
    pub station: String,
    pub files: usize,
    pub observations: Vec<DailyObservation>,
    pub dropped_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureExtremes {
    pub coldest_mean: (NaiveDate, f64),
    pub warmest_mean: (NaiveDate, f64),
    pub lowest_min: (NaiveDate, f64),
    pub highest_max: (NaiveDate, f64),
}

impl StationSeries {
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.observations.first()?.date;
        let last = self.observations.last()?.date;
        Some((first, last))
    }

    pub fn total_rows(&self) -> usize {
        self.observations.len() + self.dropped_rows
    }

    pub fn completeness_percentage(&self) -> f64 {
        if self.total_rows() == 0 {
            return 0.0;
        }
        (self.observations.len() as f64 / self.total_rows() as f64) * 100.0
    }

    pub fn extremes(&self) -> Option<TemperatureExtremes> {
        let pick = |value: fn(&DailyObservation) -> Option<f64>, warmest: bool| {
            self.observations
                .iter()
                .filter_map(|o| value(o).map(|v| (o.date, v)))
                .reduce(|best, cur| {
                    let better = if warmest { cur.1 > best.1 } else { cur.1 < best.1 };
                    if better {
                        cur
                    } else {
                        best
                    }
                })
        };

        Some(TemperatureExtremes {
            coldest_mean: pick(|o| o.mean_temp.as_option(), false)?,
            warmest_mean: pick(|o| o.mean_temp.as_option(), true)?,
            lowest_min: pick(|o| o.min_temp.as_option(), false)?,
            highest_max: pick(|o| o.max_temp.as_option(), true)?,
        })
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Station: {}", self.station);
        let _ = writeln!(out, "Files: {}", self.files);
        let _ = writeln!(
            out,
            "Complete days: {} of {} ({:.1}%)",
            self.observations.len(),
            self.total_rows(),
            self.completeness_percentage()
        );
        if let Some((first, last)) = self.date_range() {
            let _ = writeln!(out, "Date range: {} to {}", first, last);
        }
        if let Some(x) = self.extremes() {
            let _ = writeln!(out, "Coldest mean: {:.1}°C on {}", x.coldest_mean.1, x.coldest_mean.0);
            let _ = writeln!(out, "Warmest mean: {:.1}°C on {}", x.warmest_mean.1, x.warmest_mean.0);
            let _ = writeln!(out, "Lowest min:   {:.1}°C on {}", x.lowest_min.1, x.lowest_min.0);
            let _ = writeln!(out, "Highest max:  {:.1}°C on {}", x.highest_max.1, x.highest_max.0);
        }
        out
    }
}

pub struct StationSeriesLoader {
    writer: DatasetWriter,
}

impl StationSeriesLoader {
    pub fn new(writer: DatasetWriter) -> Self {
        Self { writer }
    }

    pub fn load(&self, station: &str) -> Result<StationSeries> {
        let files = self.writer.list_station_files(station)?;

        // par_iter keeps input order on collect
        let per_file: Vec<Vec<DailyObservation>> = files
            .par_iter()
            .map(|(_, path)| read_dataset(path))
            .collect::<Result<_>>()?;

        let mut observations = Vec::new();
        let mut dropped_rows = 0;
        for observation in per_file.into_iter().flatten() {
            if observation.is_complete() {
                observations.push(observation);
            } else {
                dropped_rows += 1;
            }
        }

        Ok(StationSeries {
            station: station.to_string(),
            files: files.len(),
            observations,
            dropped_rows,
        })
    }
}
