//! Persistence seams used by the orchestrator
//!
//! The orchestrator never talks to SQLite directly. It depends on these traits
//! so tests can inject failing or counting stores, and [`Database`] is the
//! production implementation of all three.

use crate::Result;
use crate::db::Database;
use crate::types::{ArticleRecord, Checkpoint, QueryWindow, WindowId, WindowStatus};
use async_trait::async_trait;

/// Durable per-window pagination progress
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for a window
    async fn load_checkpoint(&self, window_id: &WindowId) -> Result<Option<Checkpoint>>;

    /// Save a checkpoint atomically, replacing any previous one
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// Idempotent article persistence keyed on (publication_id, source_id)
#[async_trait]
pub trait ArticleWriter: Send + Sync {
    /// Write records, returning how many were new
    async fn write_articles(&self, window_id: &WindowId, records: &[ArticleRecord]) -> Result<u64>;
}

/// Durable window status
#[async_trait]
pub trait WindowLedger: Send + Sync {
    /// Register a window and return its stored status
    async fn register_window(&self, window: &QueryWindow) -> Result<WindowStatus>;

    /// Record a status transition
    async fn set_window_status(
        &self,
        window_id: &WindowId,
        status: WindowStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Move windows left IN_PROGRESS back to PENDING, returning how many moved
    async fn reset_in_progress_windows(&self) -> Result<u64>;
}

/// Everything the orchestrator needs from persistence
pub trait IngestStore: CheckpointStore + ArticleWriter + WindowLedger {}

impl<T: CheckpointStore + ArticleWriter + WindowLedger> IngestStore for T {}

#[async_trait]
impl CheckpointStore for Database {
    async fn load_checkpoint(&self, window_id: &WindowId) -> Result<Option<Checkpoint>> {
        Database::load_checkpoint(self, window_id).await
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        Database::save_checkpoint(self, checkpoint).await
    }
}

#[async_trait]
impl ArticleWriter for Database {
    async fn write_articles(&self, window_id: &WindowId, records: &[ArticleRecord]) -> Result<u64> {
        self.insert_articles(Some(window_id), records).await
    }
}

#[async_trait]
impl WindowLedger for Database {
    async fn register_window(&self, window: &QueryWindow) -> Result<WindowStatus> {
        Database::register_window(self, window).await
    }

    async fn set_window_status(
        &self,
        window_id: &WindowId,
        status: WindowStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        Database::set_window_status(self, window_id, status, error_message).await
    }

    async fn reset_in_progress_windows(&self) -> Result<u64> {
        Database::reset_in_progress_windows(self).await
    }
}
