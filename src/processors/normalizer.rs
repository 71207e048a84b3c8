use crate::error::{BackfillError, Result};
use crate::models::{DailyObservation, Value};
use crate::readers::RawRow;
use crate::utils::constants::{MAX_TEMP_COLUMN, MEAN_TEMP_COLUMN, MIN_TEMP_COLUMN};
use chrono::{Datelike, NaiveDate};

/// Turns raw table rows into dated observations.
///
/// Dates are not read from the page: the first row of a month is day 1 and
/// every following row is the next calendar day.
#[derive(Debug, Clone, Copy)]
pub struct RecordNormalizer {
    mean_column: usize,
    max_column: usize,
    min_column: usize,
}

impl RecordNormalizer {
    pub fn new() -> Self {
        Self {
            mean_column: MEAN_TEMP_COLUMN,
            max_column: MAX_TEMP_COLUMN,
            min_column: MIN_TEMP_COLUMN,
        }
    }

    pub fn required_cells(&self) -> usize {
        self.mean_column.max(self.max_column).max(self.min_column) + 1
    }

    /// Normalize one row at `date`, returning the observation and the date
    /// of the next row.
    pub fn normalize(&self, row: &RawRow, date: NaiveDate) -> Result<(DailyObservation, NaiveDate)> {
        let required = self.required_cells();
        if row.cells.len() < required {
            return Err(BackfillError::ParseFault {
                row: row.index,
                found: row.cells.len(),
                expected: required,
            });
        }

        let value_at = |column: usize| row.cell(column).map_or(Value::Missing, Value::parse);
        let observation = DailyObservation::new(
            date,
            value_at(self.mean_column),
            value_at(self.max_column),
            value_at(self.min_column),
        );

        let next = date.succ_opt().ok_or(BackfillError::InvalidMonth {
            year: date.year(),
            month: date.month(),
        })?;

        Ok((observation, next))
    }

    /// Fold a month's rows into observations dated from day 1 of the month.
    pub fn normalize_month(&self, rows: &[RawRow], year: i32, month: u32) -> Result<Vec<DailyObservation>> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(BackfillError::InvalidMonth { year, month })?;

        let (observations, _) = rows.iter().try_fold(
            (Vec::with_capacity(rows.len()), first),
            |(mut observations, date), row| {
                if date.month() != month {
                    return Err(BackfillError::RowOverflow {
                        year,
                        month,
                        row: row.index,
                    });
                }
                let (observation, next) = self.normalize(row, date)?;
                observations.push(observation);
                Ok((observations, next))
            },
        )?;

        Ok(observations)
    }
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
