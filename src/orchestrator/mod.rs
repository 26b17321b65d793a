//! Ingestion orchestrator split into focused submodules.
//!
//! The [`Orchestrator`] drives fetch → write → checkpoint across a set of
//! query windows with a bounded worker pool:
//! - [`window_task`] - Per-window state machine and page loop
//! - [`report`] - Run outcome aggregation and exit codes
//!
//! Windows are independent: each worker owns one window at a time and walks
//! its pages strictly in cursor order. Fetch failures are window-scoped and
//! recorded as FAILED; persistence failures cancel the whole run.

mod report;
mod window_task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use report::{RunReport, WindowOutcome, WindowReport};

use crate::config::{Config, MAX_WORKERS};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::fetcher::{HttpPageFetcher, PageFetcher};
use crate::planner::plan_windows;
use crate::rate_limiter::RateLimiter;
use crate::store::IngestStore;
use crate::types::{Event, PublicationId, QueryWindow};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use window_task::WindowTaskContext;

/// Ingestion orchestrator (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Orchestrator {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Page source for every window
    pub(crate) fetcher: Arc<dyn PageFetcher>,
    /// Checkpoints, articles and window status
    pub(crate) store: Arc<dyn IngestStore>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Cooperative cancellation for the run, checked between pages
    pub(crate) cancel_token: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator over the given fetcher and store
    pub fn new(config: Config, fetcher: Arc<dyn PageFetcher>, store: Arc<dyn IngestStore>) -> Self {
        let (event_tx, _rx) = tokio::sync::broadcast::channel(config.ingest.event_capacity.max(1));

        Self {
            config: Arc::new(config),
            fetcher,
            store,
            event_tx,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Create an orchestrator backed by SQLite and the HTTP search API
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Opens/creates the SQLite database and runs migrations
    /// - Creates the shared rate limiter and the HTTP page fetcher
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;

        let limiter = RateLimiter::from_config(&config.rate_limit);
        match limiter.max_requests() {
            Some(max) => tracing::info!(
                max_requests = max,
                window_secs = limiter.window().as_secs(),
                "Rate limiter initialized"
            ),
            None => tracing::warn!("Rate limiting disabled"),
        }

        let fetcher = HttpPageFetcher::new(&config.api, config.retry.clone(), limiter)?;

        Ok(Self::new(config, Arc::new(fetcher), Arc::new(db)))
    }

    /// Split `[from, to]` into windows for the configured publication and span
    pub fn plan(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<QueryWindow>> {
        let publication = PublicationId::new(self.config.ingest.publication.clone());
        plan_windows(&publication, from, to, self.config.ingest.window_span)
    }

    /// Use an externally owned cancellation token (e.g. one tied to Ctrl-C)
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Subscribe to ingestion events
    ///
    /// Events emitted before subscribing are not replayed.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that stops the run at the next page boundary when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Request cooperative cancellation of the current run
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    /// Ingest every window and report per-window outcomes
    ///
    /// Returns `Err` only for run-scoped failures (see [`Error::is_fatal`], and
    /// worker panics). Other errors escaping a worker fail just its window.
    /// On such an error the remaining windows are cancelled first, and windows
    /// whose workers were mid-page stay IN_PROGRESS for the next run to recover.
    pub async fn run(&self, windows: Vec<QueryWindow>) -> Result<RunReport> {
        let recovered = self.store.reset_in_progress_windows().await?;
        if recovered > 0 {
            tracing::warn!(
                windows = recovered,
                "Recovered windows left in progress by an unclean stop"
            );
        }

        let workers = self.config.ingest.workers.clamp(1, MAX_WORKERS);
        tracing::info!(windows = windows.len(), workers, "Starting ingestion run");

        // Child token: a fatal error stops this run without cancelling the caller's token
        let run_token = self.cancel_token.child_token();
        let concurrent_limit = Arc::new(Semaphore::new(workers));
        let mut slots: Vec<Option<WindowReport>> = vec![None; windows.len()];
        let mut tasks = JoinSet::new();

        for (index, window) in windows.into_iter().enumerate() {
            let permit = concurrent_limit
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::Other("worker pool closed".to_string()))?;

            let ctx = WindowTaskContext {
                window,
                orchestrator: self.clone(),
                cancel_token: run_token.clone(),
            };

            tasks.spawn(async move {
                let _permit = permit;
                // Cancels the run on a fatal error or a panic, before the permit is released
                let abort_run = ctx.cancel_token.clone().drop_guard();
                let window_id = ctx.window.id();
                let result = window_task::run_window_task(&ctx).await;
                if !result.as_ref().is_err_and(Error::is_fatal) {
                    abort_run.disarm();
                }
                (index, window_id, result)
            });
        }

        let mut fatal: Option<Error> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, window_id, Ok(outcome))) => {
                    slots[index] = Some(WindowReport { window_id, outcome });
                }
                Ok((_, window_id, Err(e))) if e.is_fatal() => {
                    tracing::error!(window = %window_id, error = %e, "Aborting run after fatal error");
                    run_token.cancel();
                    fatal.get_or_insert(e);
                }
                Ok((index, window_id, Err(e))) => {
                    // Ledger row is left as is; the next run picks the window up again
                    tracing::warn!(window = %window_id, error = %e, "Window aborted");
                    slots[index] = Some(WindowReport {
                        window_id,
                        outcome: WindowOutcome::Failed {
                            reason: e.to_string(),
                        },
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "Window worker panicked");
                    run_token.cancel();
                    fatal.get_or_insert(Error::Other(format!("window worker failed: {e}")));
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        let report = RunReport::new(slots.into_iter().flatten().collect());
        tracing::info!(
            complete = report.complete(),
            failed = report.failed(),
            interrupted = report.interrupted(),
            inserted = report.total_inserted(),
            "Ingestion run finished"
        );
        self.emit_event(Event::RunFinished {
            complete: report.complete(),
            failed: report.failed(),
            interrupted: report.interrupted(),
        });

        Ok(report)
    }
}
