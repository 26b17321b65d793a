//! Configuration helpers pointing the crate at a mock API and a temp database

use headline_ingest::Config;
use std::path::Path;
use std::time::Duration;
use wiremock::MockServer;

/// Config for a mock server: unlimited rate, fast retries, database under `dir`
pub fn mock_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.api.api_key = Some("e2e-key".to_string());
    config.api.request_timeout = Duration::from_secs(5);
    config.rate_limit.max_requests = 0;
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(100);
    config.retry.jitter = false;
    config.ingest.workers = 2;
    config.persistence.database_path = dir.join("headlines.db");
    config
}
