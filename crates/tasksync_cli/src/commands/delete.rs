//! Delete command implementation.

use tasksync_store::{TaskFilter, TaskId, TaskStore};
use tasksync_transport::HttpClient;

/// Runs the delete command.
pub async fn run<C: HttpClient>(
    store: &TaskStore<C>,
    id: TaskId,
) -> Result<(), Box<dyn std::error::Error>> {
    store.fetch_all(&TaskFilter::new()).await?;
    store.remove(id).await?;
    tracing::info!(id, "task deleted");
    println!("Deleted task {}", id);
    Ok(())
}
