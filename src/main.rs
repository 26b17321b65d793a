//! # headline-ingest
//!
//! Command-line frontend: plans query windows for a date range, runs the
//! ingestion and prints the per-window report.
//!
//! ## Usage
//!
//! ```sh
//! NYT_API_KEY=... headline-ingest --from 2019-01-01 --to 2019-12-31
//! ```
//!
//! Exits 0 only when every window is COMPLETE.

use chrono::NaiveDate;
use clap::Parser;
use headline_ingest::{Config, Orchestrator, WindowSpan, cancel_on_signal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

/// Resumable ingestion of historical headlines into SQLite
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Optional path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Publication to ingest (overrides ingest.publication)
    #[arg(long)]
    publication: Option<String>,

    /// First day to ingest (YYYY-MM-DD, inclusive)
    #[arg(long)]
    from: NaiveDate,

    /// Last day to ingest (YYYY-MM-DD, inclusive)
    #[arg(long)]
    to: NaiveDate,

    /// Window granularity (overrides ingest.window_span)
    #[arg(long, value_enum)]
    span: Option<WindowSpan>,

    /// SQLite database path (overrides persistence.database_path)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Concurrent window workers (overrides ingest.workers)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Article Search API key
    #[arg(long, env = "NYT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Load the config file (or defaults) and apply command-line overrides
    fn into_config(self) -> headline_ingest::Result<(Config, NaiveDate, NaiveDate, bool)> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(publication) = self.publication {
            config.ingest.publication = publication;
        }
        if let Some(span) = self.span {
            config.ingest.window_span = span;
        }
        if let Some(database) = self.database {
            config.persistence.database_path = database;
        }
        if let Some(workers) = self.workers {
            config.ingest.workers = workers;
        }
        if self.api_key.is_some() {
            config.api.api_key = self.api_key;
        }

        config.validate()?;
        Ok((config, self.from, self.to, self.json))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before parsing so NYT_API_KEY can come from it
    dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Ingestion aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> headline_ingest::Result<ExitCode> {
    let (config, from, to, json) = cli.into_config()?;
    info!(
        publication = %config.ingest.publication,
        from = %from,
        to = %to,
        span = ?config.ingest.window_span,
        database = %config.persistence.database_path.display(),
        "headline-ingest starting up"
    );

    let orchestrator = Orchestrator::open(config).await?;
    let signals = cancel_on_signal(orchestrator.cancel_token());

    let windows = orchestrator.plan(from, to)?;
    let report = orchestrator.run(windows).await;
    signals.abort();
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
