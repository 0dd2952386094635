//! Task ordering for placement.
//!
//! Order, most urgent first:
//! 1. hard deadlines before soft ones
//! 2. higher priority tier first
//! 3. earlier `due_at` first, tasks without a due date last
//!
//! Remaining ties keep the order the store returned them in.

use std::cmp::Ordering;

use crate::task::Task;

/// Comparator implementing the placement order.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    b.hard_deadline
        .cmp(&a.hard_deadline)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| match (a.due_at, b.due_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Drop finished tasks and sort the rest for placement.
pub fn prioritize(tasks: impl IntoIterator<Item = Task>) -> Vec<Task> {
    let mut pending: Vec<Task> = tasks.into_iter().filter(Task::is_pending).collect();
    pending.sort_by(compare_tasks);
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, TaskStatus};
    use chrono::{DateTime, TimeZone, Utc};

    fn due(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, 17, 0, 0).unwrap()
    }

    fn task(id: &str, priority: Priority) -> Task {
        Task::new(format!("Task {id}"), 30)
            .unwrap()
            .with_id(id)
            .with_priority(priority)
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn hard_deadline_beats_priority() {
        let tasks = vec![
            task("soft-high", Priority::High),
            task("hard-low", Priority::Low).with_hard_deadline(due(25)),
        ];
        assert_eq!(ids(&prioritize(tasks)), vec!["hard-low", "soft-high"]);
    }

    #[test]
    fn priority_tiers_descend() {
        let tasks = vec![
            task("low", Priority::Low),
            task("high", Priority::High),
            task("med", Priority::Med),
        ];
        assert_eq!(ids(&prioritize(tasks)), vec!["high", "med", "low"]);
    }

    #[test]
    fn earlier_due_first_and_undated_last() {
        let tasks = vec![
            task("undated", Priority::Med),
            task("later", Priority::Med).with_due(due(24)),
            task("sooner", Priority::Med).with_due(due(20)),
        ];
        assert_eq!(ids(&prioritize(tasks)), vec!["sooner", "later", "undated"]);
    }

    #[test]
    fn done_tasks_are_dropped() {
        let tasks = vec![
            task("finished", Priority::High).with_status(TaskStatus::Done),
            task("blocked", Priority::Low).with_status(TaskStatus::Blocked),
        ];
        assert_eq!(ids(&prioritize(tasks)), vec!["blocked"]);
    }

    #[test]
    fn full_ties_keep_input_order() {
        let tasks = vec![
            task("a", Priority::Med),
            task("b", Priority::Med),
            task("c", Priority::Med),
        ];
        assert_eq!(ids(&prioritize(tasks)), vec!["a", "b", "c"]);
    }
}
