use crate::error::{BackfillError, Result};
use crate::models::{builtin_stations, StationConfig, StationTable};
use crate::processors::default_workers;
use crate::readers::RetryPolicy;
use crate::utils::constants::{
    DEFAULT_BASE_URL, DEFAULT_CUTOFF_YEAR, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_BACKOFF_MS, DEFAULT_OUTPUT_DIR, DEFAULT_REQUEST_TIMEOUT_SECS, ENV_PREFIX,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Run settings, layered from serde defaults, an optional TOML/YAML/JSON
/// file and `JMA_BACKFILL_*` environment variables. CLI flags are applied on
/// top by the command layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillSettings {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub cutoff_year: i32,
    pub max_workers: usize,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub stations: Vec<StationConfig>,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            cutoff_year: DEFAULT_CUTOFF_YEAR,
            max_workers: default_workers(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            stations: builtin_stations(),
        }
    }
}

impl BackfillSettings {
    /// Load settings, reading `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(config = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(BackfillError::Config("base_url must not be empty".to_string()));
        }
        if self.max_workers == 0 {
            return Err(BackfillError::Config("max_workers must be at least 1".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(BackfillError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(BackfillError::Config(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        self.station_table().map(|_| ())
    }

    pub fn station_table(&self) -> Result<StationTable> {
        StationTable::new(self.stations.clone())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
