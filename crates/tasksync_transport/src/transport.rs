//! The resilient transport.

use crate::config::{RetryConfig, TransportConfig};
use crate::error::{TransportError, TransportResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Header carrying the per-call idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Per-call request options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Attempt bookkeeping for one logical call.
#[derive(Debug)]
struct RetryContext {
    attempt: u32,
    started: Instant,
}

impl RetryContext {
    fn new() -> Self {
        Self {
            attempt: 0,
            started: Instant::now(),
        }
    }

    /// Advances to the next attempt, returning the delay to wait first, or
    /// `None` once the attempt budget is spent.
    fn next_delay(&mut self, policy: &RetryConfig) -> Option<Duration> {
        if self.attempt + 1 >= policy.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(policy.delay_for_attempt(self.attempt))
    }

    fn attempts_made(&self) -> u32 {
        self.attempt + 1
    }
}

/// Sends requests and transparently retries transient failures.
///
/// A failure is retried when the server answers 429 or 5xx, or when an
/// attempt exceeds the per-attempt timeout. Anything else is returned on
/// the spot. Retries re-send the identical request, so every route reached
/// through this transport must tolerate resubmission; enable
/// [`TransportConfig::idempotency_keys`] when the server deduplicates on
/// the `Idempotency-Key` header.
pub struct Transport<C: HttpClient> {
    config: TransportConfig,
    client: C,
}

impl<C: HttpClient> Transport<C> {
    /// Creates a new transport.
    pub fn new(config: TransportConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Sends a request, retrying transient failures.
    ///
    /// Returns the first 2xx response. Terminal failures come back as-is;
    /// running out of attempts yields [`TransportError::Exhausted`] wrapping
    /// the last failure.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        options: RequestOptions,
    ) -> TransportResult<HttpResponse> {
        let request = self.build_request(method, path, body, options)?;
        let policy = &self.config.retry;
        let mut ctx = RetryContext::new();

        loop {
            debug!(
                method = %request.method,
                url = %request.url,
                attempt = ctx.attempts_made(),
                "sending request"
            );

            let err = match self.attempt(&request).await {
                Ok(response) => {
                    if ctx.attempt > 0 {
                        debug!(
                            method = %request.method,
                            url = %request.url,
                            attempts = ctx.attempts_made(),
                            elapsed = ?ctx.started.elapsed(),
                            "request succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!(method = %request.method, url = %request.url, error = %err, "terminal failure");
                return Err(err);
            }

            let Some(delay) = ctx.next_delay(policy) else {
                info!(
                    method = %request.method,
                    url = %request.url,
                    attempts = ctx.attempts_made(),
                    elapsed = ?ctx.started.elapsed(),
                    error = %err,
                    "retries exhausted"
                );
                if ctx.attempt == 0 {
                    return Err(err);
                }
                return Err(TransportError::Exhausted {
                    attempts: ctx.attempts_made(),
                    last: Box::new(err),
                });
            };

            warn!(
                method = %request.method,
                url = %request.url,
                retry = ctx.attempt,
                delay = ?delay,
                error = %err,
                "transient failure, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Sends a request with an optional JSON body and decodes a JSON response.
    pub async fn send_json<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> TransportResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = match body {
            Some(body) => Some(Bytes::from(serde_json::to_vec(body).map_err(|e| {
                TransportError::InvalidRequest(format!("failed to encode body: {}", e))
            })?)),
            None => None,
        };
        let response = self.send(method, path, body, options).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// GETs a resource and decodes the JSON response.
    pub async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> TransportResult<R> {
        self.send_json::<(), R>(Method::Get, path, None, options).await
    }

    /// POSTs a JSON body and decodes the JSON response.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> TransportResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send_json(Method::Post, path, Some(body), RequestOptions::default())
            .await
    }

    /// PATCHes a JSON body and decodes the JSON response.
    pub async fn patch_json<B, R>(&self, path: &str, body: &B) -> TransportResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send_json(Method::Patch, path, Some(body), RequestOptions::default())
            .await
    }

    /// DELETEs a resource, ignoring the response body.
    pub async fn delete(&self, path: &str) -> TransportResult<()> {
        self.send(Method::Delete, path, None, RequestOptions::default())
            .await
            .map(|_| ())
    }

    /// Runs one attempt under the per-attempt timeout.
    async fn attempt(&self, request: &HttpRequest) -> TransportResult<HttpResponse> {
        let response = tokio::time::timeout(self.config.timeout, self.client.execute(request.clone()))
            .await
            .map_err(|_| TransportError::Timeout(self.config.timeout))??;

        if response.is_success() {
            Ok(response)
        } else {
            Err(TransportError::Status {
                status: response.status,
                body: response.body,
            })
        }
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        options: RequestOptions,
    ) -> TransportResult<HttpRequest> {
        if !path.starts_with('/') {
            return Err(TransportError::InvalidRequest(format!(
                "path must be server-relative, got {:?}",
                path
            )));
        }

        let mut headers = Vec::new();
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if self.config.idempotency_keys && method != Method::Get {
            headers.push((
                IDEMPOTENCY_KEY_HEADER.to_string(),
                uuid::Uuid::new_v4().to_string(),
            ));
        }

        Ok(HttpRequest {
            method,
            url: format!("{}{}", self.config.base_url.trim_end_matches('/'), path),
            query: options.query,
            headers,
            body,
            timeout: self.config.timeout,
        })
    }
}
