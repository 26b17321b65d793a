//! Page fetcher for the external article search API
//!
//! [`PageFetcher`] is the seam the orchestrator depends on. [`HttpPageFetcher`]
//! is the production implementation: every network call first acquires a slot
//! from the shared [`RateLimiter`], and each attempt is classified into an
//! [`AttemptOutcome`] that [`retry::with_backoff`] turns into retries or a
//! [`FetchError`].
//!
//! Status classification:
//! - `429` is transient and honors `Retry-After` (seconds or HTTP-date)
//! - `5xx`, timeouts, connection failures and truncated bodies are transient
//! - any other non-success status is permanent
//! - a body that is not a valid search response is permanent

use crate::config::{ApiConfig, RetryConfig};
use crate::error::{Error, FetchError, Result};
use crate::rate_limiter::RateLimiter;
use crate::retry::{self, AttemptOutcome};
use crate::types::{ArticleRecord, Cursor, QueryWindow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use url::Url;

mod wire;

/// One page of results for a query window
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records returned on this page
    pub records: Vec<ArticleRecord>,
    /// Cursor of the following page; `None` means the window is exhausted
    pub next_cursor: Option<Cursor>,
    /// Documents dropped because they lacked an id, headline or date
    pub skipped: usize,
}

/// Retrieves pages of articles for a query window
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page at `cursor`, retrying transient failures internally
    async fn fetch(&self, window: &QueryWindow, cursor: Cursor) -> std::result::Result<Page, FetchError>;
}

/// HTTP implementation of [`PageFetcher`] for the article search API
pub struct HttpPageFetcher {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    max_pages: u32,
    retry: RetryConfig,
    limiter: RateLimiter,
}

impl HttpPageFetcher {
    /// Create a fetcher; fails if the API key is missing or the endpoint is invalid
    pub fn new(api: &ApiConfig, retry: RetryConfig, limiter: RateLimiter) -> Result<Self> {
        let api_key = api
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::config(
                    "api.api_key",
                    "an API key is required (set NYT_API_KEY or api.api_key)",
                )
            })?;

        let endpoint = Url::parse(&api.base_url)
            .and_then(|base| base.join(&api.search_path))
            .map_err(|e| Error::config("api.base_url", format!("invalid endpoint: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(api.request_timeout)
            .user_agent(api.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            max_pages: api.max_pages,
            retry,
            limiter,
        })
    }

    /// The shared limiter gating this fetcher
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn attempt(&self, window: &QueryWindow, cursor: Cursor) -> AttemptOutcome<Page> {
        if let Err(timeout) = self.limiter.acquire().await {
            return AttemptOutcome::transient(timeout.to_string());
        }

        let query = [
            ("begin_date", window.start_date.format("%Y%m%d").to_string()),
            ("end_date", window.end_date.format("%Y%m%d").to_string()),
            ("page", cursor.to_string()),
            ("fq", format!("source:(\"{}\")", window.publication_id)),
            ("sort", "oldest".to_string()),
        ];

        let response = match self
            .client
            .get(self.endpoint.clone())
            .query(&query)
            .query(&[("api-key", self.api_key.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_transport_error(e),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return AttemptOutcome::Transient {
                reason: format!("HTTP {status}"),
                retry_after: parse_retry_after(response.headers()),
            };
        }
        if status.is_server_error() {
            return AttemptOutcome::transient(format!("HTTP {status}"));
        }
        if !status.is_success() {
            return AttemptOutcome::permanent(Some(status.as_u16()), format!("HTTP {status}"));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return AttemptOutcome::transient(format!(
                    "failed to read response body: {}",
                    e.without_url()
                ));
            }
        };

        let parsed: wire::SearchResponse = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return AttemptOutcome::permanent(
                    Some(status.as_u16()),
                    format!("malformed response body: {e}"),
                );
            }
        };

        let decoded = wire::decode_page(&window.publication_id, cursor, parsed, self.max_pages);
        AttemptOutcome::Success(Page {
            records: decoded.records,
            next_cursor: decoded.next_cursor,
            skipped: decoded.skipped,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, window: &QueryWindow, cursor: Cursor) -> std::result::Result<Page, FetchError> {
        let window_id = window.id();
        let window_id = &window_id;
        retry::with_backoff(&self.retry, |attempt| async move {
            tracing::debug!(window = %window_id, cursor = %cursor, attempt, "Fetching page");
            self.attempt(window, cursor).await
        })
        .await
    }
}

fn classify_transport_error(e: reqwest::Error) -> AttemptOutcome<Page> {
    // The request URL carries the API key; never let it reach a log line
    let e = e.without_url();
    if e.is_builder() || e.is_redirect() {
        AttemptOutcome::permanent(None, format!("request rejected: {e}"))
    } else if e.is_timeout() {
        AttemptOutcome::transient(format!("request timed out: {e}"))
    } else if e.is_connect() {
        AttemptOutcome::transient(format!("connection failed: {e}"))
    } else {
        AttemptOutcome::transient(format!("request failed: {e}"))
    }
}

/// Parse `Retry-After` as delta-seconds or an HTTP-date
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = when.with_timezone(&Utc) - Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}
