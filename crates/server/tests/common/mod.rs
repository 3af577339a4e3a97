//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock capabilities injected, so the whole submission flow can be
//! exercised without an LLM behind it.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use pokevalue_core::{
    testing::{MockCardIdentifier, MockCardValuer},
    CardCapabilities, Config, DatabaseConfig, ImageValidator, LifecycleConfig, LifecycleManager,
    LlmConfig, LlmProvider, ServerConfig, SqliteSubmissionStore, StoreBackend, SubmissionStatus,
    SubmissionStore, SubmissionsConfig,
};

/// Re-export fixtures for test convenience
pub use pokevalue_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submission_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/submissions", json!({
///         "imageDataUri": fixtures::PNG_DATA_URI
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock identifier - configure identification outcomes
    pub identifier: Arc<MockCardIdentifier>,
    /// Mock valuer - configure marketplace estimates
    pub valuer: Arc<MockCardValuer>,
    /// Store shared with the router
    pub store: Arc<dyn SubmissionStore>,
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
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        // Create mocks
        let identifier = Arc::new(MockCardIdentifier::new());
        let valuer = Arc::new(MockCardValuer::new());

        // Create config
        let config = Config {
            llm: LlmConfig::new(LlmProvider::Ollama, "llava"),
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                backend: StoreBackend::Sqlite,
                path: db_path.clone(),
            },
            submissions: SubmissionsConfig {
                max_image_bytes: test_config.max_image_bytes,
                ..Default::default()
            },
            lifecycle: LifecycleConfig::default(),
        };

        let store: Arc<dyn SubmissionStore> = Arc::new(
            SqliteSubmissionStore::new(&db_path).expect("Failed to create submission store"),
        );

        let manager = LifecycleManager::new(
            Arc::clone(&store),
            CardCapabilities::new(identifier.clone(), valuer.clone()),
            ImageValidator::from_config(&config.submissions),
            &config.lifecycle,
        )
        .with_timeouts(test_config.capability_timeout, test_config.capability_timeout);

        let state = Arc::new(pokevalue_server::state::AppState::new(config, manager));

        // Create router
        let router = pokevalue_server::api::create_router(state);

        Self {
            router,
            identifier,
            valuer,
            store,
            temp_dir,
        }
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
        self.request_raw("POST", path, body.to_string(), "application/json")
            .await
    }

    /// GET the raw response body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
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

    /// Poll a submission until it reaches a terminal status.
    pub async fn wait_for_terminal(&self, id: &str) -> TestResponse {
        let path = format!("/api/v1/submissions/{}", id);
        for _ in 0..100 {
            let response = self.get(&path).await;
            let status = response.body["status"]
                .as_str()
                .and_then(|s| s.parse::<SubmissionStatus>().ok());
            if status.is_some_and(|s| s.is_terminal()) {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Submission {} did not reach a terminal status", id);
    }

    /// Send a request with raw string body and custom content type.
    async fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: String,
        content_type: &str,
    ) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
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

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Image size limit
    pub max_image_bytes: usize,
    /// Timeout applied to both capabilities
    pub capability_timeout: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: SubmissionsConfig::default().max_image_bytes,
            capability_timeout: Duration::from_secs(5),
        }
    }
}

impl TestConfig {
    /// Create config with a small image size limit.
    pub fn with_max_image_bytes(max_image_bytes: usize) -> Self {
        Self {
            max_image_bytes,
            ..Default::default()
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
