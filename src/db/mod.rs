//! Database layer for headline-ingest
//!
//! Handles SQLite persistence for query windows, articles and checkpoints.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`articles`] — Deduplicating article writes and article lookups
//! - [`checkpoints`] — Per-window pagination checkpoints
//! - [`windows`] — Window status ledger
//! - [`trends`] — Read-only aggregates for trend analysis

use crate::error::PersistenceError;
use crate::types::{ArticleRecord, Checkpoint, Cursor, PublicationId, WindowId, WindowStatus};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod articles;
mod checkpoints;
mod migrations;
mod trends;
mod windows;

pub use trends::{DailyCount, Facet, FacetCount};

/// Article record from database
#[derive(Debug, Clone, FromRow)]
pub struct StoredArticle {
    /// Unique database ID
    pub id: i64,
    /// Publication the article belongs to
    pub publication_id: String,
    /// External identifier, unique within the publication
    pub source_id: String,
    /// Window that first delivered this article
    pub window_id: Option<String>,
    /// Main headline
    pub headline: String,
    /// Unix timestamp of publication
    pub published_at: i64,
    /// Section name
    pub section: Option<String>,
    /// News desk
    pub news_desk: Option<String>,
    /// Normalized byline
    pub author: Option<String>,
    /// Canonical article URL
    pub web_url: Option<String>,
    /// Raw API document as JSON text
    pub raw_payload: String,
    /// Unix timestamp when the article was first written
    pub ingested_at: i64,
}

impl TryFrom<StoredArticle> for ArticleRecord {
    type Error = Error;

    fn try_from(row: StoredArticle) -> Result<Self> {
        let raw_payload = serde_json::from_str(&row.raw_payload).map_err(|e| {
            Error::Persistence(PersistenceError::CorruptRecord(format!(
                "article {} has invalid raw_payload: {}",
                row.source_id, e
            )))
        })?;

        Ok(ArticleRecord {
            publication_id: PublicationId(row.publication_id),
            source_id: row.source_id,
            headline: row.headline,
            published_at: timestamp_to_utc(row.published_at)?,
            section: row.section,
            news_desk: row.news_desk,
            author: row.author,
            web_url: row.web_url,
            raw_payload,
        })
    }
}

/// Checkpoint record from database
#[derive(Debug, Clone, FromRow)]
struct CheckpointRow {
    window_id: String,
    last_cursor: Cursor,
    next_cursor: Option<Cursor>,
    last_success_at: i64,
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = Error;

    fn try_from(row: CheckpointRow) -> Result<Self> {
        Ok(Checkpoint {
            window_id: WindowId(row.window_id),
            last_cursor: row.last_cursor,
            next_cursor: row.next_cursor,
            last_success_at: timestamp_to_utc(row.last_success_at)?,
        })
    }
}

/// Query window record from database
#[derive(Debug, Clone, FromRow)]
pub struct WindowRow {
    /// Window identifier (`publication:start:end`)
    pub id: String,
    /// Publication identifier
    pub publication_id: String,
    /// First day covered (ISO date)
    pub start_date: String,
    /// Last day covered (ISO date)
    pub end_date: String,
    /// Status code (see [`WindowStatus`])
    pub status: i32,
    /// Reason the window last failed
    pub error_message: Option<String>,
    /// Unix timestamp when the window was first registered
    pub created_at: i64,
    /// Unix timestamp of the last status change
    pub updated_at: i64,
    /// Unix timestamp when the window completed
    pub completed_at: Option<i64>,
}

impl WindowRow {
    /// Decoded window status
    pub fn status(&self) -> WindowStatus {
        WindowStatus::from_i32(self.status)
    }

    /// Decoded date range
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
                Error::Persistence(PersistenceError::CorruptRecord(format!(
                    "window {} has invalid date {:?}: {}",
                    self.id, value, e
                )))
            })
        };
        Ok((parse(&self.start_date)?, parse(&self.end_date)?))
    }
}

fn timestamp_to_utc(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single().ok_or_else(|| {
        Error::Persistence(PersistenceError::CorruptRecord(format!(
            "timestamp {secs} is out of range"
        )))
    })
}

/// Database handle for headline-ingest
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
