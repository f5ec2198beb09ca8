//! List command implementation.

use super::print_tasks;
use tasksync_store::{TaskFilter, TaskPriority, TaskStatus, TaskStore};
use tasksync_transport::HttpClient;

/// Runs the list command.
pub async fn run<C: HttpClient>(
    store: &TaskStore<C>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut filter = TaskFilter::new();
    filter.status = status;
    filter.priority = priority;

    let count = store.fetch_all(&filter).await?;
    tracing::info!(count, "listed tasks");
    print_tasks(&store.entities(), format)
}
