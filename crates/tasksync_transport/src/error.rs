//! Error types for the transport.

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while sending a request.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("server responded with status {status}{}", body_suffix(.body))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: Bytes,
    },

    /// A single attempt exceeded the per-attempt timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Network-level failure without a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The request was rejected before being sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Every allowed attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Total attempts made.
        attempts: u32,
        /// The failure of the final attempt.
        last: Box<TransportError>,
    },
}

fn body_suffix(body: &Bytes) -> String {
    if body.is_empty() {
        return String::new();
    }
    format!(": {}", String::from_utf8_lossy(body))
}

impl TransportError {
    /// Creates a status error from a code and body.
    pub fn status(status: u16, body: impl Into<Bytes>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Returns true if a status code is worth retrying (429 or 5xx).
    pub fn is_retryable_status(status: u16) -> bool {
        status == 429 || (500..=599).contains(&status)
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => Self::is_retryable_status(*status),
            TransportError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Returns the HTTP status of the final failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Exhausted { last, .. } => last.status_code(),
            _ => None,
        }
    }

    /// Returns the raw body of the final failure, if any.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            TransportError::Status { body, .. } => Some(body),
            TransportError::Exhausted { last, .. } => last.body(),
            _ => None,
        }
    }

    /// Returns true if the server rejected the request outright (4xx other
    /// than 429).
    pub fn is_client_rejected(&self) -> bool {
        matches!(self, TransportError::Status { status, .. }
            if (400..=499).contains(status) && *status != 429)
    }

    /// Returns true if the request failed after exhausting its retries.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, TransportError::Exhausted { .. })
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Malformed(err.to_string())
    }
}
