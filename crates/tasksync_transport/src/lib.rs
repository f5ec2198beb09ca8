//! # tasksync Transport
//!
//! Resilient HTTP transport for the tasksync client.
//!
//! This crate provides:
//! - Retry with exponential backoff (1s, 2s, 4s; capped at 30s; no jitter)
//! - Classification of transient (429, 5xx, timeout) and terminal failures
//! - A per-attempt timeout layered under the retry policy
//! - HTTP client abstraction with reqwest and loopback implementations
//!
//! ## Key Invariants
//!
//! - At most `max_attempts` attempts per logical call (4 by default)
//! - Retries re-send the identical request
//! - Retries are invisible on success; every terminal failure reaches the
//!   caller with its status and body intact

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod http;
mod reqwest_client;
mod transport;

pub use config::{RetryConfig, TransportConfig, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{TransportError, TransportResult};
pub use http::{HttpClient, HttpRequest, HttpResponse, LoopbackClient, LoopbackServer, Method};
pub use reqwest_client::ReqwestClient;
pub use transport::{RequestOptions, Transport, IDEMPOTENCY_KEY_HEADER};
