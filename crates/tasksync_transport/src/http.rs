//! HTTP client abstraction.
//!
//! The transport never talks to a concrete HTTP library directly. It hands
//! fully-built [`HttpRequest`]s to an [`HttpClient`], which lets the same
//! retry logic run over reqwest in production and over an in-process
//! [`LoopbackServer`] in tests and demos.

use crate::error::TransportResult;
use bytes::Bytes;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// HTTP methods used by the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PATCH.
    Patch,
    /// DELETE.
    Delete,
}

impl Method {
    /// Returns the canonical method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL (base URL + path).
    pub url: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Request body, JSON encoded.
    pub body: Option<Bytes>,
    /// Timeout for this attempt.
    pub timeout: Duration,
}

impl HttpRequest {
    /// Returns the path portion of the URL (everything after the authority).
    pub fn path(&self) -> &str {
        let rest = match self.url.find("://") {
            Some(i) => &self.url[i + 3..],
            None => self.url.as_str(),
        };
        match rest.find('/') {
            Some(i) => &rest[i..],
            None => "/",
        }
    }

    /// Returns the value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value of a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A raw response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a new response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a response with an empty body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual network I/O. Implementations
/// report failures that have no HTTP status (connection refused, DNS, reset)
/// as [`TransportError::Network`](crate::TransportError::Network) and
/// library-level timeouts as
/// [`TransportError::Timeout`](crate::TransportError::Timeout). Every
/// response that carries a status, successful or not, is returned as `Ok`.
pub trait HttpClient: Send + Sync {
    /// Executes a single request attempt.
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = TransportResult<HttpResponse>> + Send;
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request and returns the response.
    fn handle(&self, request: HttpRequest) -> impl Future<Output = HttpResponse> + Send;
}

/// A loopback HTTP client that routes requests directly to a server in the
/// same process.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: Arc<S>,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: Arc<S>) -> Self {
        Self { server }
    }

    /// Returns the server this client talks to.
    pub fn server(&self) -> &Arc<S> {
        &self.server
    }
}

impl<S: LoopbackServer> Clone for LoopbackClient<S> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
        }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn execute(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        Ok(self.server.handle(request).await)
    }
}
