//! Bookkeeping for writes awaiting server confirmation.

use crate::collection::TaskList;
use crate::task::{Task, TaskId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Kind of an in-flight write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// A create whose provisional task is in the list.
    Create,
    /// An update applied optimistically.
    Update,
    /// A delete waiting for the server.
    Delete,
}

/// A write issued to the server but not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingMutation {
    /// The provisional task is keyed by the placeholder itself.
    Create,
    /// `prior` is the full task as it was before the local patch.
    Update { id: TaskId, prior: Task },
    /// Nothing was changed locally.
    Delete { id: TaskId },
}

impl PendingMutation {
    pub(crate) fn kind(&self) -> MutationKind {
        match self {
            PendingMutation::Create => MutationKind::Create,
            PendingMutation::Update { .. } => MutationKind::Update,
            PendingMutation::Delete { .. } => MutationKind::Delete,
        }
    }

    /// Applies the server's answer to `list`.
    ///
    /// `confirmed` is the server task for creates and updates, `None` for
    /// deletes.
    pub(crate) fn resolve(self, placeholder: TaskId, confirmed: Option<Task>, list: &mut TaskList) {
        match (self, confirmed) {
            (PendingMutation::Create, Some(task)) => {
                let id = task.id;
                if !list.replace(placeholder, task.clone()) {
                    // The provisional entry was swept away by a refresh.
                    if !list.replace(id, task.clone()) {
                        list.prepend(task);
                    }
                }
                debug!(placeholder, id, "create confirmed");
            }
            (PendingMutation::Update { id, .. }, Some(task)) => {
                if list.replace(id, task) {
                    debug!(id, "update confirmed");
                } else {
                    debug!(id, "updated task no longer held locally");
                }
            }
            (PendingMutation::Delete { id }, _) => {
                list.remove(id);
                debug!(id, "delete confirmed");
            }
            (mutation, None) => {
                warn!(placeholder, kind = ?mutation.kind(), "confirmation without a task");
            }
        }
    }

    /// Undoes the local effect of this mutation.
    pub(crate) fn rollback(self, placeholder: TaskId, list: &mut TaskList) {
        match self {
            PendingMutation::Create => {
                list.remove(placeholder);
                warn!(placeholder, "create rolled back");
            }
            PendingMutation::Update { id, prior } => {
                if list.replace(id, prior) {
                    warn!(id, "update rolled back");
                }
            }
            PendingMutation::Delete { id } => {
                debug!(id, "delete failed; task kept");
            }
        }
    }
}

/// In-flight writes keyed by their placeholder identity.
#[derive(Debug, Default)]
pub(crate) struct PendingLedger {
    entries: HashMap<TaskId, PendingMutation>,
}

impl PendingLedger {
    pub(crate) fn insert(&mut self, placeholder: TaskId, mutation: PendingMutation) {
        self.entries.insert(placeholder, mutation);
    }

    pub(crate) fn take(&mut self, placeholder: TaskId) -> Option<PendingMutation> {
        self.entries.remove(&placeholder)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn count(&self, kind: MutationKind) -> usize {
        self.entries.values().filter(|m| m.kind() == kind).count()
    }
}
