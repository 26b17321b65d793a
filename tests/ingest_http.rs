//! End-to-end ingestion against a mock Article Search API
//!
//! These tests run the full stack: planner, shared rate limiter, HTTP fetcher
//! with retries, SQLite writer and checkpoints, and the worker pool.

mod common;

use common::{SEARCH_PATH, begin, date, mock_config, nyt, search_page};
use headline_ingest::{
    Cursor, Database, Orchestrator, QueryWindow, WindowOutcome, WindowSpan, WindowStatus,
    plan_windows,
};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn first_quarter() -> Vec<QueryWindow> {
    plan_windows(&nyt(), date(2024, 1, 1), date(2024, 3, 31), WindowSpan::Month).unwrap()
}

async fn mount_page(server: &MockServer, window: &QueryWindow, page: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("begin_date", begin(window)))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_three_windows_ten_records_each() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let windows = first_quarter();
    assert_eq!(windows.len(), 3);

    for w in &windows {
        mount_page(&server, w, 0, search_page(w, 0, 10, 10)).await;
    }

    let config = mock_config(&server, dir.path());
    let orchestrator = Orchestrator::open(config.clone()).await.unwrap();
    let report = orchestrator.run(windows.clone()).await.unwrap();

    assert_eq!(report.complete(), 3);
    assert_eq!(report.exit_code(), 0);

    let db = Database::new(&config.persistence.database_path).await.unwrap();
    assert_eq!(db.count_articles(Some(&nyt())).await.unwrap(), 30);
    for w in &windows {
        let checkpoint = db.load_checkpoint(&w.id()).await.unwrap().unwrap();
        assert!(checkpoint.is_terminal());
        assert_eq!(
            db.get_window(&w.id()).await.unwrap().unwrap().status(),
            WindowStatus::Complete
        );
    }

    let stored = db
        .get_article(&nyt(), "nyt://article/2024-02-01-3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.author.as_deref(), Some("A. Reporter"));
    db.close().await;
}

#[tokio::test]
async fn test_429_on_second_page_waits_for_retry_after_and_completes() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let window = QueryWindow::new(nyt(), date(2024, 1, 1), date(2024, 1, 31));

    mount_page(&server, &window, 0, search_page(&window, 0, 10, 30)).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(&server, &window, 1, search_page(&window, 10, 10, 30)).await;
    mount_page(&server, &window, 2, search_page(&window, 20, 10, 30)).await;

    let config = mock_config(&server, dir.path());
    let orchestrator = Orchestrator::open(config.clone()).await.unwrap();

    let started = Instant::now();
    let report = orchestrator.run(vec![window.clone()]).await.unwrap();

    assert!(
        started.elapsed() >= Duration::from_secs(5),
        "retried before Retry-After elapsed: {:?}",
        started.elapsed()
    );
    assert_eq!(
        report.outcome(&window.id()),
        Some(&WindowOutcome::Complete {
            pages: 3,
            inserted: 30
        })
    );

    let db = Database::new(&config.persistence.database_path).await.unwrap();
    assert_eq!(db.count_articles(None).await.unwrap(), 30);
    let checkpoint = db.load_checkpoint(&window.id()).await.unwrap().unwrap();
    assert!(checkpoint.is_terminal());
    assert_eq!(checkpoint.last_cursor, Cursor(2));
    db.close().await;
}

#[tokio::test]
async fn test_401_fails_only_its_window() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let windows = first_quarter();

    mount_page(&server, &windows[0], 0, search_page(&windows[0], 0, 10, 10)).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("begin_date", begin(&windows[1])))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, &windows[2], 0, search_page(&windows[2], 0, 10, 10)).await;

    let config = mock_config(&server, dir.path());
    let orchestrator = Orchestrator::open(config.clone()).await.unwrap();
    let report = orchestrator.run(windows.clone()).await.unwrap();

    assert_eq!(report.complete(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.exit_code(), 1);

    let db = Database::new(&config.persistence.database_path).await.unwrap();
    let failed = db.get_window(&windows[1].id()).await.unwrap().unwrap();
    assert_eq!(failed.status(), WindowStatus::Failed);
    assert!(failed.error_message.unwrap().contains("401"));
    assert_eq!(db.count_articles(None).await.unwrap(), 20);
    db.close().await;
}

#[tokio::test]
async fn test_rerun_makes_no_requests_and_inserts_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let windows = first_quarter();
    for w in &windows {
        mount_page(&server, w, 0, search_page(w, 0, 4, 4)).await;
    }

    let config = mock_config(&server, dir.path());
    let first = Orchestrator::open(config.clone())
        .await
        .unwrap()
        .run(windows.clone())
        .await
        .unwrap();
    assert_eq!(first.total_inserted(), 12);
    let requests_after_first = server.received_requests().await.unwrap().len();

    let second = Orchestrator::open(config.clone())
        .await
        .unwrap()
        .run(windows.clone())
        .await
        .unwrap();

    assert_eq!(second.complete(), 3);
    assert_eq!(second.total_inserted(), 0);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_after_first
    );
}

#[tokio::test]
async fn test_shared_limiter_caps_request_rate_across_workers() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let windows =
        plan_windows(&nyt(), date(2024, 1, 1), date(2024, 1, 6), WindowSpan::Day).unwrap();
    for w in &windows {
        mount_page(&server, w, 0, search_page(w, 0, 1, 1)).await;
    }

    let mut config = mock_config(&server, dir.path());
    config.rate_limit.max_requests = 3;
    config.rate_limit.window = Duration::from_secs(1);
    config.ingest.workers = 4;

    let started = Instant::now();
    let report = Orchestrator::open(config)
        .await
        .unwrap()
        .run(windows)
        .await
        .unwrap();

    assert_eq!(report.complete(), 6);
    // Six requests at three per second: the second half waits a full window
    assert!(
        started.elapsed() >= Duration::from_secs(1),
        "finished too quickly: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_missing_api_key_fails_before_any_request() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = mock_config(&server, dir.path());
    config.api.api_key = None;

    let err = Orchestrator::open(config).await.err().unwrap();
    assert_eq!(err.error_code(), "config_error");
    assert!(server.received_requests().await.unwrap().is_empty());
}
