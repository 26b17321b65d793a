//! Retry logic with exponential backoff
//!
//! A fetch attempt reports one of three outcomes: success, a transient failure
//! (optionally carrying a server-provided wait hint), or a permanent failure.
//! [`with_backoff`] drives attempts in an explicit bounded loop:
//! - success returns immediately
//! - permanent failures are surfaced without retrying
//! - transient failures sleep and retry until `max_attempts` attempts have been
//!   made, then surface as [`FetchError::Transient`]
//!
//! # Example
//!
//! ```no_run
//! use headline_ingest::retry::{AttemptOutcome, with_backoff};
//! use headline_ingest::config::RetryConfig;
//!
//! # async fn example() -> Result<(), headline_ingest::FetchError> {
//! let config = RetryConfig::default();
//! let value = with_backoff(&config, |_attempt| async {
//!     AttemptOutcome::Success(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome<T> {
    /// The attempt produced a value
    Success(T),
    /// Retryable failure (network, 5xx, 429)
    Transient {
        /// Human-readable cause
        reason: String,
        /// Server-requested wait before the next attempt (`Retry-After`)
        retry_after: Option<Duration>,
    },
    /// Non-retryable failure (bad query, auth failure, malformed response)
    Permanent {
        /// HTTP status code, when the failure came from a response
        status: Option<u16>,
        /// Human-readable cause
        reason: String,
    },
}

impl<T> AttemptOutcome<T> {
    /// Transient failure without a wait hint
    pub fn transient(reason: impl Into<String>) -> Self {
        AttemptOutcome::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }

    /// Permanent failure
    pub fn permanent(status: Option<u16>, reason: impl Into<String>) -> Self {
        AttemptOutcome::Permanent {
            status,
            reason: reason.into(),
        }
    }
}

/// Execute an async attempt with exponential backoff retry logic
///
/// `attempt` receives the 1-based attempt number. Between transient failures
/// the loop sleeps for the server's `Retry-After` hint when one is given
/// (capped at `max_retry_after`), otherwise for the current backoff delay
/// (optionally jittered). The backoff delay grows by `backoff_multiplier` after
/// every transient failure and is capped at `max_delay`.
pub async fn with_backoff<F, Fut, T>(config: &RetryConfig, mut attempt: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptOutcome<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt_no = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt_no += 1;
        match attempt(attempt_no).await {
            AttemptOutcome::Success(value) => {
                if attempt_no > 1 {
                    tracing::info!(attempts = attempt_no, "Request succeeded after retry");
                }
                return Ok(value);
            }
            AttemptOutcome::Permanent { status, reason } => {
                tracing::error!(
                    status = status,
                    reason = %reason,
                    "Request failed with non-retryable error"
                );
                return Err(FetchError::Permanent { status, reason });
            }
            AttemptOutcome::Transient {
                reason,
                retry_after,
            } => {
                if attempt_no >= max_attempts {
                    tracing::error!(
                        reason = %reason,
                        attempts = attempt_no,
                        "Request failed after all retry attempts exhausted"
                    );
                    return Err(FetchError::Transient {
                        reason,
                        attempts: attempt_no,
                    });
                }

                let wait = match retry_after {
                    Some(hint) => hint.min(config.max_retry_after),
                    None if config.jitter => add_jitter(delay),
                    None => delay,
                };

                tracing::warn!(
                    reason = %reason,
                    attempt = attempt_no,
                    max_attempts = max_attempts,
                    delay_ms = wait.as_millis() as u64,
                    server_hint = retry_after.is_some(),
                    "Request failed, retrying"
                );

                tokio::time::sleep(wait).await;

                delay = next_backoff(delay, config);
            }
        }
    }
}

/// Grow `delay` by the backoff multiplier, saturating at `max_delay`
fn next_backoff(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .map_or(config.max_delay, |next| next.min(config.max_delay))
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::try_from_secs_f64(jittered_secs).unwrap_or(Duration::MAX)
}
