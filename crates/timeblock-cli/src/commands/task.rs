//! Task management commands for CLI.

use clap::Subcommand;
use timeblock_core::{Priority, Task, TaskStatus};

use super::{parse_datetime, CliResult, Session};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Estimated effort in minutes
        #[arg(long)]
        minutes: u32,
        /// Priority: low, med or high
        #[arg(long, default_value = "med")]
        priority: Priority,
        /// Due date (RFC 3339 or "YYYY-MM-DD HH:MM" in your timezone)
        #[arg(long)]
        due: Option<String>,
        /// Treat the due date as a hard deadline
        #[arg(long, requires = "due")]
        hard: bool,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// List tasks
    List {
        /// Include done tasks
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a task done
    Done {
        /// Task ID
        id: String,
    },
    /// Set a task's status (todo, doing, blocked, done)
    Status {
        /// Task ID
        id: String,
        status: TaskStatus,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

pub fn run(user: Option<String>, action: TaskAction) -> CliResult {
    let session = Session::load(user)?;
    let db = session.open_db()?;
    let user_id = session.user_id.as_str();

    match action {
        TaskAction::Add {
            title,
            minutes,
            priority,
            due,
            hard,
            notes,
            tags,
        } => {
            let mut task = Task::new(title, minutes)?.with_priority(priority);
            if let Some(due) = due {
                let due = parse_datetime(&due, &session.timezone)?;
                task = if hard {
                    task.with_hard_deadline(due)
                } else {
                    task.with_due(due)
                };
            }
            if let Some(notes) = notes {
                task = task.with_notes(notes);
            }
            if let Some(tags) = tags {
                task = task.with_tags(
                    tags.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                );
            }
            db.create_task(user_id, &task)?;
            println!("Task created: {}", task.id);
        }
        TaskAction::List { all, json } => {
            let tasks: Vec<Task> = db
                .list_tasks(user_id)?
                .into_iter()
                .filter(|t| all || t.is_pending())
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks.");
            } else {
                for task in &tasks {
                    let due = match (task.due_at, task.hard_deadline) {
                        (Some(at), true) => format!("  due {} (hard)", session.local(at)),
                        (Some(at), false) => format!("  due {}", session.local(at)),
                        (None, _) => String::new(),
                    };
                    println!(
                        "{}  [{}] {:<4} {:>4}m  {}{}",
                        task.id,
                        task.status,
                        task.priority.as_str(),
                        task.est_minutes,
                        task.title,
                        due
                    );
                }
            }
        }
        TaskAction::Done { id } => {
            set_status(&db, user_id, &id, TaskStatus::Done)?;
            println!("Task {id} done");
        }
        TaskAction::Status { id, status } => {
            set_status(&db, user_id, &id, status)?;
            println!("Task {id} is now {status}");
        }
        TaskAction::Delete { id } => {
            if !db.delete_task(user_id, &id)? {
                return Err(format!("task not found: {id}").into());
            }
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}

fn set_status(
    db: &timeblock_core::ScheduleDb,
    user_id: &str,
    id: &str,
    status: TaskStatus,
) -> CliResult {
    if !db.update_task_status(user_id, id, status)? {
        return Err(format!("task not found: {id}").into());
    }
    Ok(())
}
