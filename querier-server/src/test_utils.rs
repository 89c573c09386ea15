use crate::config::QuerierConfig;
use crate::create_app;
use crate::executor::{ExecuteError, QueryExecutor, QueryResult};
use crate::state::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use url::form_urlencoded;
use wiremock::matchers;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

/// Test fixture for setting up a complete test environment with a mocked ClickHouse.
///
/// The fixture starts a wiremock server standing in for the ClickHouse HTTP interface,
/// configures the application against it and offers helpers for sending requests
/// through the router without binding a socket.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///
///     fixture
///         .add_clickhouse_mock(Method::POST, "/", json!({"meta": [], "data": []}), StatusCode::OK, 1)
///         .await;
///
///     let response = fixture.post_form(Some("127.0.0.1"), &[("sql", "SELECT 1")]).await;
///     response.assert_ok();
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration settings
    pub settings: QuerierConfig,
    /// Executor shared by every request
    pub executor: Arc<dyn QueryExecutor>,
    /// Mock server for ClickHouse
    pub clickhouse_mock: MockServer,
}

impl TestFixture {
    /// Creates a fixture whose executor talks to the mocked ClickHouse server.
    pub async fn new() -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let clickhouse_mock = MockServer::start().await;
        let settings = QuerierConfig::for_test_with_mock(&clickhouse_mock);
        let state = AppState::new(&settings).expect("Failed to create app state");
        let executor = state.executor.clone();
        let app = create_app(state).await;

        Self {
            app,
            settings,
            executor,
            clickhouse_mock,
        }
    }

    /// Creates a fixture around a custom executor, e.g. a [`RecordingExecutor`].
    ///
    /// The ClickHouse mock is still started so settings point at a live address.
    pub async fn with_executor(executor: Arc<dyn QueryExecutor>) -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let clickhouse_mock = MockServer::start().await;
        let settings = QuerierConfig::for_test_with_mock(&clickhouse_mock);
        let app = create_app(AppState::with_executor(&settings, executor.clone())).await;

        Self {
            app,
            settings,
            executor,
            clickhouse_mock,
        }
    }

    /// Rebuilds the router after `settings` were changed.
    pub async fn rebuild_app(&mut self) {
        let state = AppState::with_executor(&self.settings, self.executor.clone());
        self.app = create_app(state).await;
    }

    /// Rebuilds the router around a fresh ClickHouse executor after `settings`
    /// were changed, e.g. the timeout or port.
    pub async fn rebuild_clickhouse_app(&mut self) {
        let state = AppState::new(&self.settings).expect("Failed to create app state");
        self.executor = state.executor.clone();
        self.app = create_app(state).await;
    }

    /// Initializes the test logger with the given level.
    ///
    /// Called by the constructors; repeated calls are no-ops.
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Creates a request builder for the given method and URI.
    pub fn request_builder(&self, method: Method, uri: impl AsRef<str>) -> http::request::Builder {
        Request::builder().method(method).uri(uri.as_ref())
    }

    /// Sends a GET request to the specified URI.
    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends `POST /v1/query/` with `ip` in the query string and `form` as an
    /// urlencoded body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let response = fixture
    ///     .post_form(Some("10.0.0.1"), &[("db", "flow_log"), ("sql", "SELECT 1")])
    ///     .await;
    /// response.assert_ok();
    /// ```
    pub async fn post_form(&self, ip: Option<&str>, form: &[(&str, &str)]) -> TestResponse {
        let uri = match ip {
            Some(ip) => format!(
                "/v1/query/?{}",
                form_urlencoded::Serializer::new(String::new())
                    .append_pair("ip", ip)
                    .finish()
            ),
            None => "/v1/query/".to_string(),
        };
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter())
            .finish();

        let request = self
            .request_builder(Method::POST, uri)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a request and returns a TestResponse.
    ///
    /// Lower-level than `get()` and `post_form()`; use it for custom headers,
    /// bodies or request extensions.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        TestResponse { status, json }
    }

    /// Adds a mock ClickHouse route with the given method, path, and response.
    ///
    /// # Parameters
    ///
    /// - `method`: The HTTP method (e.g., Method::POST)
    /// - `path`: The path to mock (`/` for queries, `/ping` for health checks)
    /// - `response_body`: The JSON response body to return
    /// - `status_code`: HTTP status code for the response
    /// - `expected_calls`: Number of expected calls to this mock
    pub async fn add_clickhouse_mock(
        &self,
        method: Method,
        path: impl Into<String>,
        response_body: impl Serialize,
        status_code: StatusCode,
        expected_calls: u64,
    ) {
        let path_string = path.into();

        Mock::given(matchers::method(method.as_str()))
            .and(matchers::path(path_string))
            .respond_with(ResponseTemplate::new(status_code.as_u16()).set_body_json(response_body))
            .expect(expected_calls)
            .mount(&self.clickhouse_mock)
            .await;
    }
}

/// Response from a test request that provides convenient access to status and JSON body.
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response body as JSON (if present and valid JSON)
    pub json: Value,
}

impl TestResponse {
    /// Checks if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Asserts that the response has the expected status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match the expected value.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    /// Asserts that the response status is OK (200).
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Converts the response body to the specified type.
    ///
    /// # Panics
    ///
    /// Panics if deserialization fails.
    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}

type Outcome = Box<dyn Fn() -> Result<QueryResult, ExecuteError> + Send + Sync>;

/// Executor that records every argument map it receives and answers with a fixed outcome
pub struct RecordingExecutor {
    calls: Mutex<Vec<HashMap<String, String>>>,
    outcome: Outcome,
}

impl RecordingExecutor {
    /// Answers every query with `result`
    pub fn succeeding(result: QueryResult) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome: Box::new(move || Ok(result.clone())),
        }
    }

    /// Answers every query with the error built by `make_error`
    pub fn failing(make_error: fn() -> ExecuteError) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome: Box::new(move || Err(make_error())),
        }
    }

    /// Argument maps received so far, in call order
    pub fn calls(&self) -> Vec<HashMap<String, String>> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(&self, args: &HashMap<String, String>) -> Result<QueryResult, ExecuteError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(args.clone());
        (self.outcome)()
    }
}
