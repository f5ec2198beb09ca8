//! Update command implementation.

use super::print_task;
use tasksync_store::{TaskFilter, TaskId, TaskPatch, TaskStore};
use tasksync_transport::HttpClient;

/// Runs the update command.
///
/// The store only updates tasks it holds, so the list is fetched first.
pub async fn run<C: HttpClient>(
    store: &TaskStore<C>,
    id: TaskId,
    patch: TaskPatch,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if patch.is_empty() {
        return Err("Nothing to update: pass at least one field".into());
    }

    store.fetch_all(&TaskFilter::new()).await?;
    let task = store.update(id, patch).await?;
    tracing::info!(id, "task updated");
    print_task(&task, format)
}
