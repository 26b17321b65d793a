//! Per-window pagination checkpoints.

use crate::error::PersistenceError;
use crate::types::{Checkpoint, WindowId};
use crate::{Error, Result};

use super::{CheckpointRow, Database};

impl Database {
    /// Load the checkpoint for a window, if one has been saved
    pub async fn load_checkpoint(&self, window_id: &WindowId) -> Result<Option<Checkpoint>> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            r#"
            SELECT window_id, last_cursor, next_cursor, last_success_at
            FROM checkpoints
            WHERE window_id = ?
            "#,
        )
        .bind(window_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to load checkpoint: {}",
                e
            )))
        })?;

        row.map(Checkpoint::try_from).transpose()
    }

    /// Save a checkpoint as a single atomic upsert
    pub async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (window_id, last_cursor, next_cursor, last_success_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(window_id) DO UPDATE SET
                last_cursor = excluded.last_cursor,
                next_cursor = excluded.next_cursor,
                last_success_at = excluded.last_success_at
            "#,
        )
        .bind(checkpoint.window_id.as_str())
        .bind(checkpoint.last_cursor)
        .bind(checkpoint.next_cursor)
        .bind(checkpoint.last_success_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to save checkpoint: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Remove a window's checkpoint so the next run starts from the first page
    pub async fn delete_checkpoint(&self, window_id: &WindowId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE window_id = ?")
            .bind(window_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Persistence(PersistenceError::QueryFailed(format!(
                    "Failed to delete checkpoint: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
