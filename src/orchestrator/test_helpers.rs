//! Test doubles for orchestrator tests.

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, FetchError, PersistenceError, Result};
use crate::fetcher::{Page, PageFetcher};
use crate::store::{ArticleWriter, CheckpointStore, WindowLedger};
use crate::types::{
    ArticleRecord, Checkpoint, Cursor, PublicationId, QueryWindow, WindowId, WindowStatus,
};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

type Hook = Box<dyn Fn(&WindowId, Cursor) + Send + Sync>;

/// Fetcher that replays scripted responses per (window, cursor)
///
/// A script with several responses is consumed in order; the last response
/// repeats. Unscripted cursors fail permanently so a test notices stray fetches.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    scripts: Mutex<HashMap<(WindowId, Cursor), VecDeque<std::result::Result<Page, FetchError>>>>,
    calls: Mutex<Vec<(WindowId, Cursor)>>,
    hook: Option<Hook>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `hook` at the start of every fetch
    pub(crate) fn with_hook(mut self, hook: impl Fn(&WindowId, Cursor) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Sleep inside every fetch, so concurrent workers overlap
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn script(
        &self,
        window: &QueryWindow,
        cursor: Cursor,
        response: std::result::Result<Page, FetchError>,
    ) {
        self.scripts
            .lock()
            .unwrap()
            .entry((window.id(), cursor))
            .or_default()
            .push_back(response);
    }

    /// Script a window as consecutive pages of `per_page` records each
    pub(crate) fn script_pages(&self, window: &QueryWindow, pages: u32, per_page: usize) {
        for cursor in 0..pages {
            let next = (cursor + 1 < pages).then_some(Cursor(cursor + 1));
            self.script(window, Cursor(cursor), Ok(page(window, Cursor(cursor), per_page, next)));
        }
    }

    pub(crate) fn calls(&self) -> Vec<(WindowId, Cursor)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_for(&self, window: &QueryWindow) -> Vec<Cursor> {
        let id = window.id();
        self.calls()
            .into_iter()
            .filter(|(w, _)| *w == id)
            .map(|(_, c)| c)
            .collect()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        window: &QueryWindow,
        cursor: Cursor,
    ) -> std::result::Result<Page, FetchError> {
        let id = window.id();
        self.calls.lock().unwrap().push((id.clone(), cursor));
        if let Some(hook) = &self.hook {
            hook(&id, cursor);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&(id, cursor)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Err(FetchError::Permanent {
                status: None,
                reason: format!("no scripted page for cursor {cursor}"),
            }),
        }
    }
}

/// Store that delegates to a real database but fails checkpoint saves on demand
pub(crate) struct FailingStore {
    pub(crate) db: Arc<Database>,
    /// Number of checkpoint saves allowed before every save fails
    pub(crate) allowed_saves: usize,
    saves: AtomicUsize,
    /// Window whose registration is refused with a non-fatal error
    rejected: Option<WindowId>,
}

impl FailingStore {
    pub(crate) fn new(db: Arc<Database>, allowed_saves: usize) -> Self {
        Self {
            db,
            allowed_saves,
            saves: AtomicUsize::new(0),
            rejected: None,
        }
    }

    pub(crate) fn rejecting(mut self, window: &QueryWindow) -> Self {
        self.rejected = Some(window.id());
        self
    }
}

#[async_trait]
impl CheckpointStore for FailingStore {
    async fn load_checkpoint(&self, window_id: &WindowId) -> Result<Option<Checkpoint>> {
        self.db.load_checkpoint(window_id).await
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        if self.saves.fetch_add(1, Ordering::SeqCst) >= self.allowed_saves {
            return Err(Error::Persistence(PersistenceError::QueryFailed(
                "disk I/O error".to_string(),
            )));
        }
        self.db.save_checkpoint(checkpoint).await
    }
}

#[async_trait]
impl ArticleWriter for FailingStore {
    async fn write_articles(&self, window_id: &WindowId, records: &[ArticleRecord]) -> Result<u64> {
        self.db.insert_articles(Some(window_id), records).await
    }
}

#[async_trait]
impl WindowLedger for FailingStore {
    async fn register_window(&self, window: &QueryWindow) -> Result<WindowStatus> {
        if self.rejected.as_ref() == Some(&window.id()) {
            return Err(Error::InvalidWindow(format!("{} is not accepted", window.id())));
        }
        self.db.register_window(window).await
    }

    async fn set_window_status(
        &self,
        window_id: &WindowId,
        status: WindowStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.db.set_window_status(window_id, status, error_message).await
    }

    async fn reset_in_progress_windows(&self) -> Result<u64> {
        self.db.reset_in_progress_windows().await
    }
}

pub(crate) fn nyt() -> PublicationId {
    PublicationId::new("The New York Times")
}

/// Month window for 2024
pub(crate) fn month(m: u32) -> QueryWindow {
    let start = NaiveDate::from_ymd_opt(2024, m, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, m + 1, 1).unwrap().pred_opt().unwrap();
    QueryWindow::new(nyt(), start, end)
}

/// A page of `count` records whose ids are unique per (window, cursor, index)
pub(crate) fn page(window: &QueryWindow, cursor: Cursor, count: usize, next: Option<Cursor>) -> Page {
    let records = (0..count)
        .map(|i| ArticleRecord {
            publication_id: window.publication_id.clone(),
            source_id: format!("{}/{}/{}", window.start_date, cursor, i),
            headline: format!("Headline {} {} {}", window.start_date, cursor, i),
            published_at: Utc.from_utc_datetime(&window.start_date.and_hms_opt(12, 0, 0).unwrap()),
            section: Some("World".to_string()),
            news_desk: None,
            author: None,
            web_url: None,
            raw_payload: serde_json::json!({ "cursor": cursor.get(), "index": i }),
        })
        .collect();
    Page {
        records,
        next_cursor: next,
        skipped: 0,
    }
}

pub(crate) fn test_config(workers: usize) -> Config {
    let mut config = Config::default();
    config.ingest.workers = workers;
    config
}

pub(crate) async fn temp_db() -> (NamedTempFile, Arc<Database>) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (temp_file, Arc::new(db))
}
