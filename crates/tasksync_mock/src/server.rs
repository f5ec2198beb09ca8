//! The mock task server.

use crate::config::MockConfig;
use crate::error::MockError;
use crate::handler::RequestHandler;
use crate::table::{Record, TaskTable};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tasksync_transport::{HttpRequest, HttpResponse, LoopbackServer, Method};

/// Query parameter that forces a failure response.
pub const FAIL_PARAM: &str = "fail";

/// Statuses the `fail` query parameter can force.
const FORCEABLE_STATUSES: [u16; 2] = [429, 500];

/// A request as the mock received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Request path, without query.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Body parsed as JSON, if any.
    pub body: Option<Value>,
}

impl RecordedRequest {
    fn capture(request: &HttpRequest) -> Self {
        Self {
            method: request.method,
            path: request.path().to_string(),
            query: request.query.clone(),
            headers: request.headers.clone(),
            body: request
                .body
                .as_deref()
                .and_then(|bytes| serde_json::from_slice(bytes).ok()),
        }
    }

    /// Returns the value of a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// In-process mock of the tasks REST service.
///
/// Serves `/api/tasks` from an in-memory table with artificial latency.
/// Failures can be forced per request with `?fail=429` or `?fail=500`, or
/// scripted ahead of time with [`MockTaskServer::inject_failures`]. Forced
/// failures answer immediately and leave the table untouched.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tasksync_mock::{MockConfig, MockTaskServer};
/// use tasksync_transport::LoopbackClient;
///
/// let server = Arc::new(MockTaskServer::seeded(3, MockConfig::instant()));
/// let client = LoopbackClient::new(Arc::clone(&server));
/// assert_eq!(server.records().len(), 3);
/// # drop(client);
/// ```
pub struct MockTaskServer {
    config: MockConfig,
    table: Arc<TaskTable>,
    handler: RequestHandler,
    failures: Mutex<VecDeque<u16>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTaskServer {
    /// Creates a server with an empty table.
    pub fn new(config: MockConfig) -> Self {
        Self::with_table(config, TaskTable::new())
    }

    /// Creates a server holding tasks `1..=count`.
    pub fn seeded(count: usize, config: MockConfig) -> Self {
        Self::with_table(config, TaskTable::seeded(count, Utc::now()))
    }

    /// Creates a server holding exactly `records`, in list order.
    pub fn with_records(records: Vec<Record>, config: MockConfig) -> Self {
        Self::with_table(config, TaskTable::from_records(records))
    }

    fn with_table(config: MockConfig, table: TaskTable) -> Self {
        let table = Arc::new(table);
        Self {
            config,
            handler: RequestHandler::new(Arc::clone(&table)),
            table,
            failures: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Makes the next `count` requests fail with `status`.
    pub fn inject_failures(&self, status: u16, count: usize) {
        self.failures
            .lock()
            .extend(std::iter::repeat(status).take(count));
    }

    /// Returns the number of scripted failures not yet served.
    pub fn pending_failures(&self) -> usize {
        self.failures.lock().len()
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Forgets recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    /// Returns a copy of the server-side records, in list order.
    pub fn records(&self) -> Vec<Record> {
        self.table.records()
    }

    /// Returns the server-side record with the given id.
    pub fn record(&self, id: i64) -> Option<Record> {
        self.table.get(id)
    }

    /// Deletes a record behind the client's back.
    pub fn remove_record(&self, id: i64) -> bool {
        self.table.remove(id)
    }

    fn forced_failure(&self, request: &HttpRequest) -> Option<u16> {
        if let Some(status) = self.failures.lock().pop_front() {
            return Some(status);
        }
        request
            .query_param(FAIL_PARAM)
            .and_then(|value| value.parse::<u16>().ok())
            .filter(|status| FORCEABLE_STATUSES.contains(status))
    }
}

impl LoopbackServer for MockTaskServer {
    async fn handle(&self, request: HttpRequest) -> HttpResponse {
        self.requests.lock().push(RecordedRequest::capture(&request));

        if let Some(status) = self.forced_failure(&request) {
            tracing::debug!(method = %request.method, path = request.path(), status, "forced failure");
            return MockError::Injected(status).into_response();
        }

        let delay = self.config.sample_latency();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .handler
            .handle(&request)
            .unwrap_or_else(MockError::into_response);
        tracing::debug!(
            method = %request.method,
            path = request.path(),
            status = response.status,
            "handled request"
        );
        response
    }
}
