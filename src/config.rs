//! Configuration types for headline-ingest

use crate::error::{Error, Result};
use crate::planner::WindowSpan;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Upper bound on concurrent window workers
pub const MAX_WORKERS: usize = 16;

/// Main configuration for headline-ingest
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// External news API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Outbound request quota
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry behavior for transient fetch failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Orchestration settings (publication, workers, window span)
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Load a JSON configuration file; missing sections fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.ingest.workers == 0 || self.ingest.workers > MAX_WORKERS {
            return Err(Error::config(
                "ingest.workers",
                format!("must be between 1 and {MAX_WORKERS}"),
            ));
        }
        if self.ingest.publication.trim().is_empty() {
            return Err(Error::config("ingest.publication", "must not be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts", "must be at least 1"));
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be a number >= 1.0",
            ));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(Error::config(
                "retry.initial_delay",
                "must not exceed retry.max_delay",
            ));
        }
        if self.rate_limit.max_requests > 0 && self.rate_limit.window.is_zero() {
            return Err(Error::config("rate_limit.window", "must be greater than 0"));
        }
        if self.api.max_pages == 0 {
            return Err(Error::config("api.max_pages", "must be at least 1"));
        }
        url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config("api.base_url", format!("invalid URL: {e}")))?;
        Ok(())
    }
}

/// External news API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API (default: "https://api.nytimes.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the article search endpoint
    #[serde(default = "default_search_path")]
    pub search_path: String,

    /// API key; usually supplied via `NYT_API_KEY` instead of the file
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Deepest page the API will serve for one query (default: 100)
    ///
    /// The reference API refuses `page` values at or beyond this limit, so a
    /// window is considered exhausted once it gets there.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_path: default_search_path(),
            api_key: None,
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            max_pages: default_max_pages(),
        }
    }
}

/// Outbound request quota, shared by every worker
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per rolling window (0 = unlimited, default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Length of the rolling window (default: 60 seconds)
    #[serde(default = "default_rate_window", with = "duration_serde")]
    pub window: Duration,

    /// Longest a caller waits for a slot before the attempt counts as a transient failure
    #[serde(default = "default_acquire_timeout", with = "duration_serde")]
    pub acquire_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window: default_rate_window(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per page, including the first (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Upper bound applied to a server-provided `Retry-After` (default: 120 seconds)
    #[serde(default = "default_max_retry_after", with = "duration_serde")]
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
            max_retry_after: default_max_retry_after(),
        }
    }
}

/// Orchestration settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Publication identifier sent to the API (default: "The New York Times")
    #[serde(default = "default_publication")]
    pub publication: String,

    /// Concurrent window workers (default: 2)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How a date range is split into windows (default: month)
    #[serde(default)]
    pub window_span: WindowSpan,

    /// Capacity of the event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            publication: default_publication(),
            workers: default_workers(),
            window_span: WindowSpan::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Persistence configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./headlines.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.nytimes.com".to_string()
}

fn default_search_path() -> String {
    "/svc/search/v2/articlesearch.json".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("headline-ingest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_pages() -> u32 {
    100
}

fn default_max_requests() -> u32 {
    5
}

fn default_rate_window() -> Duration {
    Duration::from_secs(60)
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_retry_after() -> Duration {
    Duration::from_secs(120)
}

fn default_true() -> bool {
    true
}

fn default_publication() -> String {
    "The New York Times".to_string()
}

fn default_workers() -> usize {
    2
}

fn default_event_capacity() -> usize {
    1024
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./headlines.db")
}

// Duration serialization helper (seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_api_quota() {
        let config = Config::default();
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.retry.backoff_multiplier, 2.0);
        assert_eq!(config.ingest.window_span, WindowSpan::Month);
        config.validate().unwrap();
    }

    #[test]
    fn empty_json_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.api.base_url, "https://api.nytimes.com");
        assert_eq!(config.ingest.workers, 2);
        assert_eq!(config.persistence.database_path, PathBuf::from("./headlines.db"));
    }

    #[test]
    fn durations_deserialize_from_seconds() {
        let config: Config = serde_json::from_str(
            r#"{"rate_limit": {"max_requests": 10, "window": 30, "acquire_timeout": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(30));
        assert_eq!(config.rate_limit.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn duration_serde_rejects_string_instead_of_integer() {
        let result: std::result::Result<RetryConfig, _> =
            serde_json::from_str(r#"{"initial_delay": "1s"}"#);
        assert!(result.is_err(), "durations are integer seconds only");
    }

    #[test]
    fn api_key_is_never_serialized() {
        let mut config = Config::default();
        config.api.api_key = Some("secret-key".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-key"));
        assert!(!json.contains("api_key"));
    }

    #[test]
    fn api_key_can_be_read_from_file() {
        let config: Config = serde_json::from_str(r#"{"api": {"api_key": "abc"}}"#).unwrap();
        assert_eq!(config.api.api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.ingest.workers = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("ingest.workers")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_too_many_workers() {
        let mut config = Config::default();
        config.ingest.workers = MAX_WORKERS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts_and_shrinking_backoff() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.backoff_multiplier = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.backoff_multiplier = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("api.base_url")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn unlimited_rate_allows_zero_window() {
        let mut config = Config::default();
        config.rate_limit.max_requests = 0;
        config.rate_limit.window = Duration::ZERO;
        config.validate().unwrap();
    }

    #[test]
    fn from_file_loads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ingest": {{"publication": "nyt", "workers": 3, "window_span": "week"}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.ingest.publication, "nyt");
        assert_eq!(config.ingest.workers, 3);
        assert_eq!(config.ingest.window_span, WindowSpan::Week);
    }

    #[test]
    fn from_file_reports_parse_errors_as_config_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(Error::Config { key: None, .. })
        ));
    }
}
