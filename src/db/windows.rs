//! Window status ledger.

use crate::error::PersistenceError;
use crate::types::{QueryWindow, WindowId, WindowStatus};
use crate::{Error, Result};

use super::{Database, WindowRow};

impl Database {
    /// Register a window, keeping the existing row if it was seen before
    ///
    /// Returns the window's current status: `Pending` for a new window,
    /// otherwise whatever a previous run left behind.
    pub async fn register_window(&self, window: &QueryWindow) -> Result<WindowStatus> {
        let now = chrono::Utc::now().timestamp();
        let id = window.id();

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO query_windows (
                id, publication_id, start_date, end_date, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.as_str())
        .bind(window.publication_id.as_str())
        .bind(window.start_date.to_string())
        .bind(window.end_date.to_string())
        .bind(WindowStatus::Pending.to_i32())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to register window: {}",
                e
            )))
        })?;

        let status: i32 = sqlx::query_scalar("SELECT status FROM query_windows WHERE id = ?")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Persistence(PersistenceError::QueryFailed(format!(
                    "Failed to read window status: {}",
                    e
                )))
            })?;

        Ok(WindowStatus::from_i32(status))
    }

    /// Update a window's status and error message
    ///
    /// Moving to `Complete` stamps `completed_at`; any other status clears it.
    pub async fn set_window_status(
        &self,
        window_id: &WindowId,
        status: WindowStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE query_windows
            SET status = ?, error_message = ?, updated_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.to_i32())
        .bind(error_message)
        .bind(now)
        .bind(if status == WindowStatus::Complete {
            Some(now)
        } else {
            None
        })
        .bind(window_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to update window status: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Persistence(PersistenceError::QueryFailed(format!(
                "window {} is not registered",
                window_id
            ))));
        }

        Ok(())
    }

    /// Get a window by ID
    pub async fn get_window(&self, window_id: &WindowId) -> Result<Option<WindowRow>> {
        sqlx::query_as::<_, WindowRow>(
            r#"
            SELECT
                id, publication_id, start_date, end_date, status,
                error_message, created_at, updated_at, completed_at
            FROM query_windows
            WHERE id = ?
            "#,
        )
        .bind(window_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to get window: {}",
                e
            )))
        })
    }

    /// List windows ordered by start date, optionally filtered by status
    pub async fn list_windows(&self, status: Option<WindowStatus>) -> Result<Vec<WindowRow>> {
        let query = match status {
            Some(_) => {
                r#"
                SELECT
                    id, publication_id, start_date, end_date, status,
                    error_message, created_at, updated_at, completed_at
                FROM query_windows
                WHERE status = ?
                ORDER BY start_date ASC, id ASC
                "#
            }
            None => {
                r#"
                SELECT
                    id, publication_id, start_date, end_date, status,
                    error_message, created_at, updated_at, completed_at
                FROM query_windows
                ORDER BY start_date ASC, id ASC
                "#
            }
        };

        let mut q = sqlx::query_as::<_, WindowRow>(query);
        if let Some(status) = status {
            q = q.bind(status.to_i32());
        }

        q.fetch_all(&self.pool).await.map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to list windows: {}",
                e
            )))
        })
    }

    /// Reset windows left IN_PROGRESS by an unclean stop back to PENDING
    ///
    /// Returns the number of windows reset. Their checkpoints are untouched, so
    /// they resume from the last persisted page.
    pub async fn reset_in_progress_windows(&self) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE query_windows
            SET status = ?, updated_at = ?
            WHERE status = ?
            "#,
        )
        .bind(WindowStatus::Pending.to_i32())
        .bind(now)
        .bind(WindowStatus::InProgress.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to reset in-progress windows: {}",
                e
            )))
        })?;

        Ok(result.rows_affected())
    }
}
