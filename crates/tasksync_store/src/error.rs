//! Error types for the store.

use crate::task::TaskId;
use tasksync_transport::TransportError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The task is not held locally; the server was not contacted.
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The task is still a placeholder awaiting its create confirmation.
    #[error("task {0} has not been confirmed by the server yet")]
    Unconfirmed(TaskId),

    /// The request failed terminally.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl StoreError {
    /// Returns the transport failure, if this came from the network.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            StoreError::Transport(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the HTTP status of the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        self.transport().and_then(TransportError::status_code)
    }

    /// Returns true if the failure was detected locally, before any request.
    pub fn is_local(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::Unconfirmed(_))
    }
}
