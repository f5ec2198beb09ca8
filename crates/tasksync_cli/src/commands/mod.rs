//! CLI command implementations.

pub mod create;
pub mod delete;
pub mod demo;
pub mod list;
pub mod update;

use tasksync_store::{Task, TaskStatus};

/// Renders one task as a single text line.
pub fn task_line(task: &Task) -> String {
    let mark = match task.status {
        TaskStatus::Completed => 'x',
        TaskStatus::Pending => ' ',
    };
    let mut line = format!(
        "{:>5}  [{}] {:<6}  {}",
        task.id,
        mark,
        task.priority.as_str(),
        task.title
    );
    if !task.description.is_empty() {
        line.push_str(" - ");
        line.push_str(&task.description);
    }
    line
}

/// Prints a list of tasks in the requested format.
pub fn print_tasks(tasks: &[Task], format: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(tasks)?);
        }
        _ => {
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in tasks {
                println!("{}", task_line(task));
            }
        }
    }
    Ok(())
}

/// Prints a single task in the requested format.
pub fn print_task(task: &Task, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(task)?),
        _ => println!("{}", task_line(task)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(id: i64, title: &str, description: &str, status: &str) -> Task {
        serde_json::from_value(json!({
            "id": id,
            "title": title,
            "description": description,
            "status": status,
            "priority": "high",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    #[test]
    fn line_for_pending_task() {
        let line = task_line(&task(12, "Ship", "", "pending"));
        assert_eq!(line, "   12  [ ] high    Ship");
    }

    #[test]
    fn line_for_completed_task_with_description() {
        let line = task_line(&task(3, "Review", "second pass", "completed"));
        assert_eq!(line, "    3  [x] high    Review - second pass");
    }
}
