use crate::error::{BackfillError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

/// A weather station as addressed by the remote statistics pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StationConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Prefecture number (`prec_no` on the wire)
    #[validate(range(min = 1))]
    pub region_code: u32,

    /// Station block number (`block_no` on the wire)
    #[validate(range(min = 1))]
    pub station_code: u32,
}

impl StationConfig {
    pub fn new(name: impl Into<String>, region_code: u32, station_code: u32) -> Self {
        Self {
            name: name.into(),
            region_code,
            station_code,
        }
    }
}

/// Validated, insertion-ordered set of stations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationTable {
    stations: Vec<StationConfig>,
}

impl StationTable {
    pub fn new(stations: Vec<StationConfig>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(stations.len());
        for station in &stations {
            station.validate()?;
            if !seen.insert(station.name.as_str()) {
                return Err(BackfillError::DuplicateStation {
                    name: station.name.clone(),
                });
            }
        }
        Ok(Self { stations })
    }

    /// Stations shipped with the tool.
    pub fn builtin() -> Self {
        Self {
            stations: builtin_stations(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&StationConfig> {
        self.stations.iter().find(|s| s.name == name)
    }

    /// Keep only the named stations, preserving table order.
    pub fn select(&self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        for name in names {
            if self.get(name).is_none() {
                return Err(BackfillError::StationNotFound { name: name.clone() });
            }
        }
        let stations = self
            .stations
            .iter()
            .filter(|s| names.contains(&s.name))
            .cloned()
            .collect();
        Ok(Self { stations })
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationConfig> {
        self.stations.iter()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl<'a> IntoIterator for &'a StationTable {
    type Item = &'a StationConfig;
    type IntoIter = std::slice::Iter<'a, StationConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.stations.iter()
    }
}

pub fn builtin_stations() -> Vec<StationConfig> {
    vec![
        StationConfig::new("Sapporo", 14, 47412),
        StationConfig::new("Yamagata", 35, 47588),
        StationConfig::new("Tokyo", 44, 47662),
        StationConfig::new("Yokohama", 46, 47670),
        StationConfig::new("Osaka", 62, 47772),
        StationConfig::new("Fukuoka", 82, 47807),
    ]
}
