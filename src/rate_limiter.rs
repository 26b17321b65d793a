//! Request quota enforcement shared by every fetch worker
//!
//! The external API grants a fixed number of requests per rolling window (the
//! reference API allows 5 per minute). A single [`RateLimiter`] is created per
//! run and cloned into every worker, so all callers draw from the same quota.
//!
//! # Algorithm
//!
//! A sliding log of issue timestamps is kept behind a fair async mutex:
//! - A slot is granted when fewer than `max_requests` timestamps fall inside the
//!   trailing `window`.
//! - Otherwise the caller sleeps until the oldest timestamp leaves the window.
//! - The mutex is held while sleeping, so waiters are admitted strictly in
//!   arrival order and no two callers can race for the same freed slot.
//!
//! For every interval of length `window`, at most `max_requests` permits are
//! issued.

use crate::config::RateLimitConfig;
use crate::error::AcquireTimeout;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Proof that a request slot was granted
#[derive(Debug, Clone, Copy)]
pub struct RatePermit {
    issued_at: Instant,
}

impl RatePermit {
    /// When the slot was granted
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

/// Outcome of a single admission check
#[derive(Debug, PartialEq, Eq)]
enum Admission {
    Granted,
    RateLimitExceeded { retry_in: Duration },
}

/// Timestamps of permits issued within the trailing window
#[derive(Debug, Default)]
struct RequestLog {
    issued: VecDeque<Instant>,
}

impl RequestLog {
    fn try_admit(&mut self, now: Instant, max_requests: u32, window: Duration) -> Admission {
        while let Some(&oldest) = self.issued.front() {
            if now.duration_since(oldest) >= window {
                self.issued.pop_front();
            } else {
                break;
            }
        }

        if self.issued.len() < max_requests as usize {
            self.issued.push_back(now);
            return Admission::Granted;
        }

        // The log is full, so it has a front entry
        let oldest = self.issued.front().copied().unwrap_or(now);
        let retry_in = window.saturating_sub(now.duration_since(oldest));
        Admission::RateLimitExceeded { retry_in }
    }
}

/// Global request limiter shared across all workers
#[derive(Clone)]
pub struct RateLimiter {
    log: Arc<Mutex<RequestLog>>,
    max_requests: u32,
    window: Duration,
    acquire_timeout: Option<Duration>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per rolling `window` (0 = unlimited)
    ///
    /// # Examples
    ///
    /// ```
    /// use headline_ingest::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// // 5 requests per rolling minute
    /// let limiter = RateLimiter::new(5, Duration::from_secs(60));
    /// assert_eq!(limiter.max_requests(), Some(5));
    ///
    /// // Unlimited
    /// let unlimited = RateLimiter::new(0, Duration::from_secs(60));
    /// assert_eq!(unlimited.max_requests(), None);
    /// ```
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            log: Arc::new(Mutex::new(RequestLog::default())),
            max_requests,
            window,
            acquire_timeout: None,
        }
    }

    /// Create a limiter from configuration, including the acquire timeout
    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window).with_acquire_timeout(config.acquire_timeout)
    }

    /// Bound how long [`acquire`](Self::acquire) may wait
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Requests allowed per window, or None if unlimited
    pub fn max_requests(&self) -> Option<u32> {
        if self.max_requests == 0 {
            None
        } else {
            Some(self.max_requests)
        }
    }

    /// Length of the rolling window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for a request slot
    ///
    /// Returns [`AcquireTimeout`] if no slot became available within the
    /// configured bound. A timed-out caller consumes no slot.
    pub async fn acquire(&self) -> Result<RatePermit, AcquireTimeout> {
        if self.max_requests == 0 {
            return Ok(RatePermit {
                issued_at: Instant::now(),
            });
        }

        match self.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, self.acquire_slot())
                .await
                .map_err(|_| AcquireTimeout(limit)),
            None => Ok(self.acquire_slot().await),
        }
    }

    async fn acquire_slot(&self) -> RatePermit {
        let mut log = self.log.lock().await;
        loop {
            let now = Instant::now();
            match log.try_admit(now, self.max_requests, self.window) {
                Admission::Granted => return RatePermit { issued_at: now },
                Admission::RateLimitExceeded { retry_in } => {
                    tracing::debug!(
                        wait_ms = retry_in.as_millis() as u64,
                        max_requests = self.max_requests,
                        "Request quota exhausted, waiting for a slot"
                    );
                    tokio::time::sleep(retry_in).await;
                }
            }
        }
    }

    /// Slots that could be granted right now without waiting
    pub async fn available(&self) -> u32 {
        if self.max_requests == 0 {
            return u32::MAX;
        }
        let log = self.log.lock().await;
        let now = Instant::now();
        let live = log
            .issued
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count() as u32;
        self.max_requests.saturating_sub(live)
    }
}
