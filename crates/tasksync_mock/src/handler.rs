//! Request routing for the tasks endpoints.

use crate::error::{MockError, MockResult};
use crate::table::{Record, TaskTable};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tasksync_transport::{HttpRequest, HttpResponse, Method};

/// Collection path served by the mock.
pub const TASKS_ROUTE: &str = "/api/tasks";

/// A resolved route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `/api/tasks`
    Collection,
    /// `/api/tasks/{id}`
    Item(i64),
}

impl Route {
    /// Resolves a request path.
    pub fn parse(path: &str) -> MockResult<Route> {
        let path = path.trim_end_matches('/');
        if path == TASKS_ROUTE {
            return Ok(Route::Collection);
        }

        let rest = path
            .strip_prefix(TASKS_ROUTE)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or(MockError::NotFound)?;
        if rest.contains('/') {
            return Err(MockError::NotFound);
        }
        rest.parse::<i64>()
            .map(Route::Item)
            .map_err(|_| MockError::BadRequest(format!("invalid task id: {rest}")))
    }
}

/// Handler for task requests.
pub struct RequestHandler {
    table: Arc<TaskTable>,
}

impl RequestHandler {
    /// Creates a handler over the given table.
    pub fn new(table: Arc<TaskTable>) -> Self {
        Self { table }
    }

    /// Dispatches a request to the matching endpoint.
    pub fn handle(&self, request: &HttpRequest) -> MockResult<HttpResponse> {
        match (Route::parse(request.path())?, request.method) {
            (Route::Collection, Method::Get) => self.handle_list(request),
            (Route::Collection, Method::Post) => self.handle_create(request),
            (Route::Item(id), Method::Patch) => self.handle_update(id, request),
            (Route::Item(id), Method::Delete) => Ok(self.handle_delete(id)),
            _ => Err(MockError::MethodNotAllowed),
        }
    }

    /// `GET /api/tasks`, optionally filtered by `status` and `priority`.
    fn handle_list(&self, request: &HttpRequest) -> MockResult<HttpResponse> {
        let data = self.table.list(
            request.query_param("status"),
            request.query_param("priority"),
        );
        json_response(200, &json!({ "data": data }))
    }

    /// `POST /api/tasks`
    fn handle_create(&self, request: &HttpRequest) -> MockResult<HttpResponse> {
        let body = object_body(request)?;
        let has_title = body
            .get("title")
            .and_then(Value::as_str)
            .is_some_and(|title| !title.trim().is_empty());
        if !has_title {
            return Err(MockError::BadRequest("title is required".into()));
        }

        let created = self.table.insert(body, Utc::now());
        json_response(201, &Value::Object(created))
    }

    /// `PATCH /api/tasks/{id}`
    fn handle_update(&self, id: i64, request: &HttpRequest) -> MockResult<HttpResponse> {
        let body = object_body(request)?;
        let updated = self
            .table
            .patch(id, body, Utc::now())
            .ok_or(MockError::NotFound)?;
        json_response(200, &Value::Object(updated))
    }

    /// `DELETE /api/tasks/{id}`. Answers 204 whether or not the task existed.
    fn handle_delete(&self, id: i64) -> HttpResponse {
        if !self.table.remove(id) {
            tracing::debug!(id, "delete of unknown task");
        }
        HttpResponse::empty(204)
    }
}

fn object_body(request: &HttpRequest) -> MockResult<Record> {
    let bytes = request
        .body
        .as_deref()
        .ok_or_else(|| MockError::BadRequest("missing body".into()))?;
    match serde_json::from_slice(bytes) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(MockError::BadRequest("body must be a JSON object".into())),
        Err(err) => Err(MockError::BadRequest(err.to_string())),
    }
}

fn json_response(status: u16, value: &Value) -> MockResult<HttpResponse> {
    let body = serde_json::to_vec(value).map_err(|err| MockError::BadRequest(err.to_string()))?;
    Ok(HttpResponse::new(status, body))
}
