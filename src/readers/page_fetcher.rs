use crate::error::{BackfillError, Result};
use crate::models::StationConfig;
use crate::utils::constants::{
    DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS, USER_AGENT,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, warn};

/// One page of daily observations: a station's month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub region_code: u32,
    pub station_code: u32,
    pub year: i32,
    pub month: u32,
}

impl PageRequest {
    pub fn new(station: &StationConfig, year: i32, month: u32) -> Self {
        Self {
            region_code: station.region_code,
            station_code: station.station_code,
            year,
            month,
        }
    }

    /// Query string pairs; the page is always requested from day 1.
    pub fn query_pairs(&self) -> [(&'static str, String); 6] {
        [
            ("prec_no", self.region_code.to_string()),
            ("block_no", self.station_code.to_string()),
            ("year", self.year.to_string()),
            ("month", self.month.to_string()),
            ("day", "1".to_string()),
            ("view", String::new()),
        ]
    }

    pub fn url(&self, base_url: &str) -> String {
        let query = self
            .query_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", base_url, query)
    }
}

/// Source of raw page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        )
    }
}

/// Fetches pages over HTTP with a per-request timeout and bounded retries.
pub struct HttpPageFetcher {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpPageFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BackfillError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self, request: &PageRequest) -> Result<String> {
        let url = request.url(&self.base_url);
        debug!(%url, "Fetching page");

        let response = self
            .client
            .get(&self.base_url)
            .query(&request.query_pairs()[..])
            .send()
            .await
            .map_err(|source| BackfillError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackfillError::HttpStatus { url, status });
        }

        response
            .text()
            .await
            .map_err(|source| BackfillError::Transport { url, source })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(request).await {
                Ok(body) => {
                    debug!(
                        year = request.year,
                        month = request.month,
                        bytes = body.len(),
                        "Page received"
                    );
                    return Ok(body);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        error!(attempts = attempt, error = %e, "Exhausted retries");
                    }
                    return Err(e);
                }
            }
        }
    }
}
