use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single measurement cell: either a number or the missing marker.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    Number(f64),
    #[default]
    Missing,
}

impl Value {
    /// Convert raw cell text. Never fails: empty cells, dash placeholders,
    /// quality-flagged text and non-finite numbers are all `Missing`.
    pub fn parse(cell: &str) -> Self {
        match cell.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Value::Number(v),
            _ => Value::Missing,
        }
    }

    pub fn as_option(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Value::Number(v),
            _ => Value::Missing,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub mean_temp: Value,
    pub max_temp: Value,
    pub min_temp: Value,
}

impl DailyObservation {
    pub fn new(date: NaiveDate, mean_temp: Value, max_temp: Value, min_temp: Value) -> Self {
        Self {
            date,
            mean_temp,
            max_temp,
            min_temp,
        }
    }

    pub fn is_complete(&self) -> bool {
        !(self.mean_temp.is_missing() || self.max_temp.is_missing() || self.min_temp.is_missing())
    }

    pub fn missing_fields(&self) -> usize {
        [self.mean_temp, self.max_temp, self.min_temp]
            .iter()
            .filter(|v| v.is_missing())
            .count()
    }
}

/// On-disk row shape; `None` serializes as an empty field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub date: NaiveDate,
    pub mean_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
}

impl From<&DailyObservation> for DatasetRow {
    fn from(obs: &DailyObservation) -> Self {
        Self {
            date: obs.date,
            mean_temp: obs.mean_temp.as_option(),
            max_temp: obs.max_temp.as_option(),
            min_temp: obs.min_temp.as_option(),
        }
    }
}

impl From<DatasetRow> for DailyObservation {
    fn from(row: DatasetRow) -> Self {
        Self {
            date: row.date,
            mean_temp: row.mean_temp.into(),
            max_temp: row.max_temp.into(),
            min_temp: row.min_temp.into(),
        }
    }
}

/// Observations of one station for one calendar year, in date order.
#[derive(Debug, Clone, PartialEq)]
pub struct YearDataset {
    pub station: String,
    pub year: i32,
    pub observations: Vec<DailyObservation>,
}

impl YearDataset {
    pub fn new(station: impl Into<String>, year: i32) -> Self {
        Self {
            station: station.into(),
            year,
            observations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn extend(&mut self, observations: Vec<DailyObservation>) {
        self.observations.extend(observations);
    }

    pub fn missing_value_count(&self) -> usize {
        self.observations.iter().map(|o| o.missing_fields()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    Transport,
    ParseFault,
}

/// What happened to one month while collecting a year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthOutcome {
    /// Table found and normalized into this many observations.
    Rows(usize),
    /// Table present but no data rows after the headers.
    EmptyTable,
    /// Page returned without an observation table.
    NoTable,
    Failed { kind: FailureKind, message: String },
}

impl MonthOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, MonthOutcome::Failed { .. })
    }
}

/// Result of collecting one (station, year) pair.
#[derive(Debug, Clone)]
pub struct YearCollection {
    pub dataset: YearDataset,
    /// Indexed by month - 1.
    pub months: Vec<MonthOutcome>,
}

impl YearCollection {
    /// A year is complete when no month failed; absent tables are fine.
    pub fn is_complete(&self) -> bool {
        !self.months.iter().any(MonthOutcome::is_failed)
    }

    pub fn failed_months(&self) -> Vec<u32> {
        self.months
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(i, _)| i as u32 + 1)
            .collect()
    }

    pub fn months_without_table(&self) -> usize {
        self.months
            .iter()
            .filter(|m| matches!(m, MonthOutcome::NoTable | MonthOutcome::EmptyTable))
            .count()
    }
}
