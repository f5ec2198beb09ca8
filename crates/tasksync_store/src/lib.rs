//! # tasksync Store
//!
//! Optimistic in-memory task store for the tasksync client.
//!
//! This crate provides:
//! - The task model and request payloads
//! - An ordered, id-keyed task collection
//! - A ledger of writes awaiting server confirmation
//! - [`TaskStore`]: fetch, create, update and remove with optimistic local
//!   effects, reconciliation and rollback
//!
//! ## Key Invariants
//!
//! - Task ids are unique within the collection at every observation point
//! - Placeholder ids are negative; server ids are positive
//! - Reconciliation is keyed by placeholder identity, never by position
//! - A failed write leaves the collection as it was before the call
//! - The store never retries; retry lives in the transport

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod collection;
mod error;
mod pending;
mod store;
mod task;

pub use collection::TaskList;
pub use error::{StoreError, StoreResult};
pub use pending::MutationKind;
pub use store::{StoreSnapshot, TaskStore, TASKS_PATH};
pub use task::{
    is_placeholder, ParseFieldError, Task, TaskFilter, TaskId, TaskInput, TaskPatch, TaskPriority,
    TaskStatus,
};
