//! # tasksync Mock
//!
//! In-process mock of the tasks REST service.
//!
//! This crate provides:
//! - A seeded, in-memory task table
//! - Routing for `GET`/`POST /api/tasks` and `PATCH`/`DELETE /api/tasks/{id}`
//! - Artificial latency and forced failures (`?fail=429`, `?fail=500`, or
//!   scripted with [`MockTaskServer::inject_failures`])
//! - Request recording for assertions
//!
//! The server implements [`tasksync_transport::LoopbackServer`], so a
//! [`tasksync_transport::LoopbackClient`] drives it through the real
//! transport stack without a network.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod table;

pub use config::MockConfig;
pub use error::{MockError, MockResult};
pub use handler::{RequestHandler, Route, TASKS_ROUTE};
pub use server::{MockTaskServer, RecordedRequest, FAIL_PARAM};
pub use table::{record_id, Record, TaskTable};
