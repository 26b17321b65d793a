//! # headline-ingest
//!
//! Incremental, resumable ingestion of historical headlines from a
//! rate-limited, paginated news search API into SQLite.
//!
//! ## Design Philosophy
//!
//! headline-ingest is designed to be:
//! - **Resumable** - Every persisted page is checkpointed, so an interrupted run picks up where it stopped
//! - **Idempotent** - Articles are keyed on (publication, source id); replays never duplicate
//! - **Polite** - One shared rate limiter gates every request the process makes
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use headline_ingest::{Config, Orchestrator};
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.api.api_key = std::env::var("NYT_API_KEY").ok();
//!
//!     let orchestrator = Orchestrator::open(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let windows = orchestrator.plan(
//!         NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
//!     )?;
//!     let report = orchestrator.run(windows).await?;
//!     println!("{report}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Page fetching from the article search API
pub mod fetcher;
/// Ingestion orchestration with a bounded worker pool
pub mod orchestrator;
/// Splitting date ranges into query windows
pub mod planner;
/// Sliding-window request rate limiting
pub mod rate_limiter;
/// Retry logic with exponential backoff
pub mod retry;
/// Persistence traits used by the orchestrator
pub mod store;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{Error, FetchError, PersistenceError, Result};
pub use fetcher::{HttpPageFetcher, Page, PageFetcher};
pub use orchestrator::{Orchestrator, RunReport, WindowOutcome, WindowReport};
pub use planner::{WindowSpan, plan_windows};
pub use rate_limiter::RateLimiter;
pub use store::{ArticleWriter, CheckpointStore, IngestStore, WindowLedger};
pub use types::{
    ArticleRecord, Checkpoint, Cursor, Event, PublicationId, QueryWindow, WindowId, WindowStatus,
};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when a termination signal arrives.
///
/// Spawns a background task so the caller can keep running the ingestion;
/// workers stop at their next page boundary once the token is cancelled.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use headline_ingest::{Config, Orchestrator, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = Orchestrator::open(Config::default()).await?;
///     cancel_on_signal(orchestrator.cancel_token());
///     Ok(())
/// }
/// ```
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = shutdown_signal() => {
                tracing::info!(signal, "Stopping at the next page boundary");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

/// Resolve with the name of the first shutdown signal received
///
/// Listens for Ctrl-C everywhere and additionally for SIGTERM on unix. A
/// listener that cannot be installed never resolves.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for Ctrl-C");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not register SIGTERM handler");
                std::future::pending().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    }
}
