//! Ordered task collection keyed by id.

use crate::task::{Task, TaskId};
use tracing::warn;

/// The store's canonical, ordered list of tasks.
///
/// Every lookup goes through the task id, so concurrent inserts and removals
/// never cause an operation to touch the wrong entry. Ids are unique within
/// the list at all times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    items: Vec<Task>,
}

impl TaskList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from server data, dropping repeated ids.
    pub fn from_server(tasks: Vec<Task>) -> Self {
        let mut list = Self::new();
        for task in tasks {
            if list.contains(task.id) {
                warn!(id = task.id, "server returned a duplicate task id; keeping the first");
                continue;
            }
            list.items.push(task);
        }
        list
    }

    /// Returns the tasks in order.
    pub fn as_slice(&self) -> &[Task] {
        &self.items
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current index of `id`.
    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.items.iter().position(|task| task.id == id)
    }

    /// Returns true if `id` is present.
    pub fn contains(&self, id: TaskId) -> bool {
        self.position(id).is_some()
    }

    /// Returns the task with `id`.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.items.iter().find(|task| task.id == id)
    }

    /// Inserts a task at the front, replacing any entry with the same id.
    pub fn prepend(&mut self, task: Task) {
        self.items.retain(|existing| existing.id != task.id);
        self.items.insert(0, task);
    }

    /// Replaces the entry keyed by `id` with `task`, keeping its position.
    ///
    /// `task` may carry a different id (a placeholder being confirmed). Any
    /// other entry already holding the new id is dropped so ids stay unique.
    /// Returns false, leaving the list untouched, if `id` is absent.
    pub fn replace(&mut self, id: TaskId, task: Task) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        if task.id != id {
            if let Some(dup) = self.position(task.id) {
                self.items.remove(dup);
                let index = if dup < index { index - 1 } else { index };
                self.items[index] = task;
                return true;
            }
        }
        self.items[index] = task;
        true
    }

    /// Removes and returns the task with `id`.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let index = self.position(id)?;
        Some(self.items.remove(index))
    }

    /// Iterates over the tasks in order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.items.iter()
    }
}
