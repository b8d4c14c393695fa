//! In-process mock upstream
//!
//! Serves an axum router on 127.0.0.1:0 so clients talk real HTTP.

use axum::Router;
use pharmvar_common::config::RetryConfig;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Request log shared between a mock handler and the test
#[derive(Clone, Default)]
pub struct HitLog(Arc<Mutex<Vec<(String, Instant)>>>);

impl HitLog {
    pub fn record(&self, path: impl Into<String>) {
        self.0.lock().unwrap().push((path.into(), Instant::now()));
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn count_path(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .count()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.0.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

/// Serve `router` on an ephemeral port; returns its base URL
pub async fn spawn_mock_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Retry settings small enough for tests
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 50,
        request_timeout_secs: 5,
    }
}
