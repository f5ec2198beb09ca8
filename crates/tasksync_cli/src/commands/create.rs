//! Create command implementation.

use super::print_task;
use tasksync_store::{TaskInput, TaskStore};
use tasksync_transport::HttpClient;

/// Runs the create command.
pub async fn run<C: HttpClient>(
    store: &TaskStore<C>,
    input: TaskInput,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = store.create(input).await?;
    tracing::info!(id = task.id, "task created");
    print_task(&task, format)
}
