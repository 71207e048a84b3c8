/// Remote endpoint
pub const DEFAULT_BASE_URL: &str = "https://www.data.jma.go.jp/obd/stats/etrn/view/daily_s1.php";
pub const USER_AGENT: &str = concat!("jma-backfill/", env!("CARGO_PKG_VERSION"));

/// Observation table layout
pub const TABLE_CLASS: &str = "data2_s";
pub const HEADER_ROWS: usize = 4;
pub const MEAN_TEMP_COLUMN: usize = 6;
pub const MAX_TEMP_COLUMN: usize = 7;
pub const MIN_TEMP_COLUMN: usize = 8;
pub const REQUIRED_CELLS: usize = MIN_TEMP_COLUMN + 1;

/// Persisted dataset layout
pub const DATASET_EXTENSION: &str = "csv";
pub const LOCK_EXTENSION: &str = "lock";
pub const DATASET_HEADER: [&str; 4] = ["date", "mean_temp", "max_temp", "min_temp"];
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_OUTPUT_DIR: &str = "csv";

/// Backfill defaults
pub const DEFAULT_CUTOFF_YEAR: i32 = 1872;
pub const MONTHS_PER_YEAR: u32 = 12;
pub const MAX_WORKERS_CAP: usize = 8;
pub const DEFAULT_WORKER_LIMIT: usize = 4;

/// Network defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "JMA_BACKFILL";
