use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackfillError>;

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Malformed table row {row}: found {found} cells, expected at least {expected}")]
    ParseFault {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Table has more rows than days in {year}-{month:02} (row {row})")]
    RowOverflow { year: i32, month: u32, row: usize },

    #[error("Invalid CSS selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Invalid calendar month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("Invalid year range: cutoff {cutoff} is after current year {current}")]
    InvalidYearRange { cutoff: i32, current: i32 },

    #[error("Duplicate station name '{name}' in station table")]
    DuplicateStation { name: String },

    #[error("Station '{name}' not found in station table")]
    StationNotFound { name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid dataset file name: {0}")]
    InvalidFileName(String),

    #[error("Processing cancelled by user")]
    Cancelled,

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl BackfillError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BackfillError::Transport { source, .. } => {
                source.is_timeout()
                    || source.is_connect()
                    || source.is_request()
                    || source.is_body()
                    || source.is_decode()
            }
            BackfillError::HttpStatus { status, .. } => {
                status.is_server_error()
                    || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    || *status == reqwest::StatusCode::REQUEST_TIMEOUT
            }
            _ => false,
        }
    }

    /// Whether the error means the page no longer has the expected structure.
    pub fn is_parse_fault(&self) -> bool {
        matches!(
            self,
            BackfillError::ParseFault { .. } | BackfillError::RowOverflow { .. }
        )
    }
}
