//! Error types for the mock server.

use tasksync_transport::HttpResponse;
use thiserror::Error;

/// Result type for mock handlers.
pub type MockResult<T> = Result<T, MockError>;

/// Failures the mock server answers with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MockError {
    /// Unknown route or record.
    #[error("Not found")]
    NotFound,

    /// Invalid request body or path.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Known route, unsupported method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Failure forced by the `fail` query parameter or an injected script.
    #[error("{}", injected_text(*.0))]
    Injected(u16),
}

fn injected_text(status: u16) -> &'static str {
    match status {
        429 => "Too Many Requests",
        500 => "Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Injected failure",
    }
}

impl MockError {
    /// Returns the HTTP status for this error.
    pub fn status(&self) -> u16 {
        match self {
            MockError::NotFound => 404,
            MockError::BadRequest(_) => 400,
            MockError::MethodNotAllowed => 405,
            MockError::Injected(status) => *status,
        }
    }

    /// Renders the error as a plain-text response.
    pub fn into_response(self) -> HttpResponse {
        HttpResponse::new(self.status(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(MockError::NotFound.status(), 404);
        assert_eq!(MockError::BadRequest("x".into()).status(), 400);
        assert_eq!(MockError::MethodNotAllowed.status(), 405);
        assert_eq!(MockError::Injected(429).status(), 429);
    }

    #[test]
    fn responses_carry_text() {
        let response = MockError::Injected(500).into_response();
        assert_eq!(response.status, 500);
        assert_eq!(&response.body[..], b"Server Error");

        let response = MockError::NotFound.into_response();
        assert_eq!(&response.body[..], b"Not found");
    }
}
