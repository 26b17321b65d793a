//! Core types for headline-ingest

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the publication being ingested (e.g. "The New York Times")
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicationId(pub String);

impl PublicationId {
    /// Create a new PublicationId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PublicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PublicationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Page position within a query window
///
/// The reference API addresses pages by a 0-based `page` parameter, so cursors
/// are totally ordered and a successor always compares greater.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cursor(pub u32);

impl Cursor {
    /// Cursor of the first page in every window
    pub const FIRST: Cursor = Cursor(0);

    /// The cursor immediately after this one
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Get the inner page index
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Stored as INTEGER in SQLite
impl sqlx::Type<sqlx::Sqlite> for Cursor {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for Cursor {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&i64::from(self.0), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for Cursor {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(u32::try_from(raw)?))
    }
}

/// Stable identifier of a query window, derived from its publication and dates
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub String);

impl WindowId {
    /// Borrow the inner identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bounded unit of ingestion work: one publication, one inclusive date range
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    /// Publication being ingested
    pub publication_id: PublicationId,
    /// First day covered (inclusive)
    pub start_date: NaiveDate,
    /// Last day covered (inclusive)
    pub end_date: NaiveDate,
    /// Cursor of the next page to fetch
    pub page_cursor: Cursor,
}

impl QueryWindow {
    /// Create a window positioned at its first page
    pub fn new(publication_id: PublicationId, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            publication_id,
            start_date,
            end_date,
            page_cursor: Cursor::FIRST,
        }
    }

    /// Stable identifier used as the checkpoint key
    pub fn id(&self) -> WindowId {
        WindowId(format!(
            "{}:{}:{}",
            self.publication_id, self.start_date, self.end_date
        ))
    }
}

/// A single article as persisted by the deduplicating writer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Publication the article belongs to
    pub publication_id: PublicationId,
    /// External identifier, unique within the publication
    pub source_id: String,
    /// Main headline
    pub headline: String,
    /// Publication timestamp
    pub published_at: DateTime<Utc>,
    /// Section name, when the API provides one
    pub section: Option<String>,
    /// News desk that filed the article
    pub news_desk: Option<String>,
    /// Byline with the leading "By " removed
    pub author: Option<String>,
    /// Canonical article URL
    pub web_url: Option<String>,
    /// Untouched API document, kept for later re-processing
    pub raw_payload: serde_json::Value,
}

/// Durable progress marker for one query window
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Window this checkpoint belongs to
    pub window_id: WindowId,
    /// Cursor of the last page whose records were persisted
    pub last_cursor: Cursor,
    /// Cursor to resume from; `None` once the window is exhausted
    pub next_cursor: Option<Cursor>,
    /// When the last page was persisted
    pub last_success_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Whether the API reported no further pages for this window
    pub fn is_terminal(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Lifecycle state of a query window
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    /// Not started, or stopped before reaching the last page
    Pending,
    /// Pages are being fetched and written
    InProgress,
    /// Last page written and terminal checkpoint saved
    Complete,
    /// Permanent failure or retry budget exhausted
    Failed,
}

impl WindowStatus {
    /// Convert integer status code to WindowStatus enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => WindowStatus::Pending,
            1 => WindowStatus::InProgress,
            2 => WindowStatus::Complete,
            3 => WindowStatus::Failed,
            _ => WindowStatus::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert WindowStatus enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            WindowStatus::Pending => 0,
            WindowStatus::InProgress => 1,
            WindowStatus::Complete => 2,
            WindowStatus::Failed => 3,
        }
    }
}

impl std::fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WindowStatus::Pending => "PENDING",
            WindowStatus::InProgress => "IN_PROGRESS",
            WindowStatus::Complete => "COMPLETE",
            WindowStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Event emitted during an ingestion run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A worker picked up a window
    WindowStarted {
        /// Window being processed
        window_id: WindowId,
        /// Cursor the window resumes from
        resume_from: Cursor,
    },

    /// One page was persisted and checkpointed
    PageWritten {
        /// Window the page belongs to
        window_id: WindowId,
        /// Cursor of the page
        cursor: Cursor,
        /// Records returned by the API
        fetched: usize,
        /// Records that were new
        inserted: u64,
    },

    /// Window reached its terminal cursor
    WindowCompleted {
        /// Window that completed
        window_id: WindowId,
        /// Pages fetched during this run
        pages: u32,
        /// New records inserted during this run
        inserted: u64,
    },

    /// Window failed and was skipped
    WindowFailed {
        /// Window that failed
        window_id: WindowId,
        /// Why it failed
        reason: String,
    },

    /// Window stopped between pages because the run was cancelled
    WindowInterrupted {
        /// Window that was interrupted
        window_id: WindowId,
        /// Cursor that will be fetched on the next run
        resume_from: Cursor,
    },

    /// Run finished (successfully or not)
    RunFinished {
        /// Windows that completed
        complete: usize,
        /// Windows that failed
        failed: usize,
        /// Windows that were interrupted or never started
        interrupted: usize,
    },
}
