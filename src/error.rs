//! Error types for headline-ingest
//!
//! The taxonomy mirrors how failures propagate through an ingestion run:
//! - [`FetchError`] is window-scoped. Transient failures are retried inside the
//!   page fetcher, and once exhausted (or on a permanent failure) the window is
//!   marked failed while the run carries on with other windows.
//! - [`PersistenceError`] (and raw [`sqlx::Error`]) is run-scoped and always
//!   fatal, because checkpoint integrity can no longer be guaranteed.
//! - Everything else (configuration, I/O, serialization) is surfaced to the
//!   caller before or around a run.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for headline-ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for headline-ingest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "ingest.workers")
        key: Option<String>,
    },

    /// Persistence layer failed; aborts the run
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Fetching a page from the external API failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error outside of page fetching (e.g. building the HTTP client)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid date range or window definition
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// The run was cancelled before it could finish
    #[error("run cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error must abort the whole run rather than a single window
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Persistence(_) | Error::Sqlx(_) | Error::Io(_) | Error::Serialization(_)
        )
    }

    /// Machine-readable error code used in run reports
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Persistence(_) | Error::Sqlx(_) => "persistence_error",
            Error::Fetch(e) => e.error_code(),
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidWindow(_) => "invalid_window",
            Error::Cancelled => "cancelled",
            Error::Other(_) => "internal_error",
        }
    }
}

/// Persistence-related errors (checkpoint store, article writer, window ledger)
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Stored value could not be decoded back into a domain type
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// Constraint violation other than the dedup conflict key
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Page fetch failures surfaced by the page fetcher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Retryable failure (network, 5xx, 429) that persisted through the retry budget
    #[error("transient failure after {attempts} attempt(s): {reason}")]
    Transient {
        /// Description of the last failure observed
        reason: String,
        /// Number of attempts made, including the first
        attempts: u32,
    },

    /// Non-retryable failure (4xx other than 429, malformed response)
    #[error("permanent failure: {reason}")]
    Permanent {
        /// HTTP status code, when the failure came from a response
        status: Option<u16>,
        /// Description of the failure
        reason: String,
    },
}

impl FetchError {
    /// Whether the failure was transient (and exhausted its retries)
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    /// Machine-readable error code used in run reports
    pub fn error_code(&self) -> &'static str {
        match self {
            FetchError::Transient { .. } => "transient_fetch_error",
            FetchError::Permanent { .. } => "permanent_fetch_error",
        }
    }
}

/// Waiting for a rate-limiter slot exceeded the configured bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out after {0:?} waiting for a rate limit slot")]
pub struct AcquireTimeout(pub Duration);
