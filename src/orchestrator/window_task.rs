//! Per-window state machine: `PENDING -> IN_PROGRESS -> (COMPLETE | FAILED)`.

use crate::error::Result;
use crate::types::{Checkpoint, Cursor, Event, QueryWindow, WindowId, WindowStatus};
use tokio_util::sync::CancellationToken;

use super::{Orchestrator, WindowOutcome};

/// Shared context for a single window task
pub(crate) struct WindowTaskContext {
    pub(crate) window: QueryWindow,
    pub(crate) orchestrator: Orchestrator,
    pub(crate) cancel_token: CancellationToken,
}

impl WindowTaskContext {
    async fn mark(&self, id: &WindowId, status: WindowStatus, error: Option<&str>) -> Result<()> {
        self.orchestrator
            .store
            .set_window_status(id, status, error)
            .await
    }

    async fn fail(&self, id: &WindowId, reason: String) -> Result<WindowOutcome> {
        tracing::error!(window = %id, reason = %reason, "Window failed");
        self.mark(id, WindowStatus::Failed, Some(&reason)).await?;
        self.orchestrator.emit_event(Event::WindowFailed {
            window_id: id.clone(),
            reason: reason.clone(),
        });
        Ok(WindowOutcome::Failed { reason })
    }

    async fn interrupt(&self, id: &WindowId, resume_from: Cursor) -> Result<WindowOutcome> {
        tracing::info!(window = %id, resume_from = %resume_from, "Window interrupted");
        self.mark(id, WindowStatus::Pending, None).await?;
        self.orchestrator.emit_event(Event::WindowInterrupted {
            window_id: id.clone(),
            resume_from,
        });
        Ok(WindowOutcome::Interrupted {
            resume_from: Some(resume_from),
        })
    }

    async fn complete(&self, id: &WindowId, pages: u32, inserted: u64) -> Result<WindowOutcome> {
        self.mark(id, WindowStatus::Complete, None).await?;
        tracing::info!(window = %id, pages, inserted, "Window complete");
        self.orchestrator.emit_event(Event::WindowCompleted {
            window_id: id.clone(),
            pages,
            inserted,
        });
        Ok(WindowOutcome::Complete { pages, inserted })
    }
}

/// Drive one window to a terminal or interrupted state
///
/// Every page is written before its checkpoint is saved, so a crash between
/// the two replays at most one page, which the writer deduplicates.
/// `Err` is returned only for persistence failures.
pub(crate) async fn run_window_task(ctx: &WindowTaskContext) -> Result<WindowOutcome> {
    // Cancelled before this window got a worker: leave it untouched
    if ctx.cancel_token.is_cancelled() {
        return Ok(WindowOutcome::Interrupted { resume_from: None });
    }

    let window = &ctx.window;
    let id = window.id();
    let store = &ctx.orchestrator.store;

    let previous = store.register_window(window).await?;
    if previous == WindowStatus::Failed {
        tracing::info!(window = %id, "Retrying previously failed window from its checkpoint");
    }

    let mut cursor = match store.load_checkpoint(&id).await? {
        Some(checkpoint) => match checkpoint.next_cursor {
            None => {
                tracing::debug!(window = %id, "Checkpoint is terminal, nothing to fetch");
                return ctx.complete(&id, 0, 0).await;
            }
            Some(next) => {
                tracing::info!(
                    window = %id,
                    last_cursor = %checkpoint.last_cursor,
                    resume_from = %next,
                    "Resuming window from checkpoint"
                );
                next
            }
        },
        None => window.page_cursor,
    };

    if ctx.cancel_token.is_cancelled() {
        return ctx.interrupt(&id, cursor).await;
    }

    ctx.mark(&id, WindowStatus::InProgress, None).await?;
    ctx.orchestrator.emit_event(Event::WindowStarted {
        window_id: id.clone(),
        resume_from: cursor,
    });

    let mut pages = 0u32;
    let mut inserted = 0u64;

    loop {
        if ctx.cancel_token.is_cancelled() {
            return ctx.interrupt(&id, cursor).await;
        }

        let page = match ctx.orchestrator.fetcher.fetch(window, cursor).await {
            Ok(page) => page,
            Err(e) => return ctx.fail(&id, e.to_string()).await,
        };

        if let Some(next) = page.next_cursor {
            if next <= cursor {
                return ctx
                    .fail(
                        &id,
                        format!("cursor regression: page {cursor} returned next cursor {next}"),
                    )
                    .await;
            }
        }

        let written = store.write_articles(&id, &page.records).await?;

        store
            .save_checkpoint(&Checkpoint {
                window_id: id.clone(),
                last_cursor: cursor,
                next_cursor: page.next_cursor,
                last_success_at: chrono::Utc::now(),
            })
            .await?;

        pages += 1;
        inserted += written;
        tracing::debug!(
            window = %id,
            cursor = %cursor,
            fetched = page.records.len(),
            inserted = written,
            skipped = page.skipped,
            "Page written"
        );
        ctx.orchestrator.emit_event(Event::PageWritten {
            window_id: id.clone(),
            cursor,
            fetched: page.records.len(),
            inserted: written,
        });

        match page.next_cursor {
            Some(next) => cursor = next,
            None => return ctx.complete(&id, pages, inserted).await,
        }
    }
}
