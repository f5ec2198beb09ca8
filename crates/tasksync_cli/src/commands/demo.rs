//! Demo command implementation.
//!
//! Walks through a session against an in-process mock server: an optimistic
//! create, a create that survives injected server errors, an update that is
//! rolled back after a 404 and a delete.

use super::{print_tasks, task_line};
use std::sync::Arc;
use std::time::Duration;
use tasksync_mock::{MockConfig, MockTaskServer};
use tasksync_store::{
    is_placeholder, TaskFilter, TaskInput, TaskPatch, TaskPriority, TaskStatus, TaskStore,
};
use tasksync_transport::{LoopbackClient, Transport, TransportConfig};

const DEMO_SEED: usize = 3;

/// Runs the demo command.
pub async fn run(config: TransportConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(MockTaskServer::seeded(DEMO_SEED, MockConfig::default()));
    let store = TaskStore::new(Transport::new(config, LoopbackClient::new(Arc::clone(&server))));
    let mut changes = store.subscribe();

    println!("== Loading tasks");
    let count = store.fetch_all(&TaskFilter::new()).await?;
    println!("Loaded {} tasks", count);

    println!("\n== Optimistic create");
    let provisional = async {
        let snapshot = changes
            .wait_for(|snapshot| snapshot.entities.iter().any(|t| is_placeholder(t.id)))
            .await
            .ok()?;
        let task = snapshot.entities.iter().find(|t| is_placeholder(t.id)).cloned();
        drop(snapshot);
        task
    };
    let (created, provisional) = tokio::join!(
        store.create(TaskInput::new("Write the release notes").with_priority(TaskPriority::High)),
        tokio::time::timeout(Duration::from_secs(1), provisional)
    );
    if let Ok(Some(task)) = provisional {
        println!("shown before the server answered: {}", task_line(&task));
    }
    let created = created?;
    println!("confirmed by the server:          {}", task_line(&created));

    println!("\n== Create through two server errors");
    server.inject_failures(500, 2);
    let before = server.request_count();
    match store.create(TaskInput::new("Survive flaky servers")).await {
        Ok(task) => println!(
            "created after {} requests: {}",
            server.request_count() - before,
            task_line(&task)
        ),
        Err(err) => println!("create failed and was rolled back: {}", err),
    }

    println!("\n== Update rolled back after a 404");
    let target = 2;
    server.remove_record(target);
    match store
        .update(target, TaskPatch::new().status(TaskStatus::Completed))
        .await
    {
        Ok(task) => println!("unexpectedly updated: {}", task_line(&task)),
        Err(err) => {
            println!("update failed: {}", err);
            if let Some(task) = store.get(target) {
                println!("restored to:   {}", task_line(&task));
            }
        }
    }

    println!("\n== Delete");
    store.remove(3).await?;
    println!("deleted task 3");

    println!("\n== Final state ({} pending writes)", store.pending_mutations());
    print_tasks(&store.entities(), format)
}
