//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! backed by a temp-dir SQLite library and mocked catalog access.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use reelmatch_core::{
    testing::{MockEnricher, MockSearcher},
    Config, DatabaseConfig, MatchOrchestrator, NewFile, SqliteLibrary,
};
use reelmatch_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use reelmatch_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_match() {
///     let fixture = TestFixture::new().await;
///     let file_id = fixture.add_file("Night_Drive_Edit.mp4");
///
///     let response = fixture.post("/api/v1/match", json!({ "file_id": file_id })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock searcher - configure search results
    pub searcher: Arc<MockSearcher>,
    /// Mock enricher - configure detail page data
    pub enricher: Arc<MockEnricher>,
    /// Library backing the server
    pub library: Arc<SqliteLibrary>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let searcher = Arc::new(MockSearcher::new());
        let enricher = Arc::new(MockEnricher::new());
        let library =
            Arc::new(SqliteLibrary::new(&db_path).expect("Failed to create library"));

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            ..Config::default()
        };

        let orchestrator = MatchOrchestrator::new(
            Arc::clone(&searcher) as Arc<dyn reelmatch_core::Searcher>,
            Arc::clone(&enricher) as Arc<dyn reelmatch_core::Enricher>,
            Arc::clone(&library) as Arc<dyn reelmatch_core::Library>,
            config.matcher.clone(),
        );
        let state = Arc::new(AppState::new(config, Arc::new(orchestrator)));
        let router = create_router(state);

        Self {
            router,
            searcher,
            enricher,
            library,
            temp_dir,
        }
    }

    /// Register an unlinked video file.
    pub fn add_file(&self, filename: &str) -> u64 {
        self.library
            .insert_file(&NewFile::video("/media/pmv", filename))
            .expect("Failed to insert file")
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Raw text body of a GET request.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
