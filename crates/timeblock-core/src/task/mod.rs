//! Task types consumed by the scheduler.
//!
//! Tasks are owned by the task store; the scheduler only reads them and
//! never schedules a task whose status is [`TaskStatus::Done`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Priority tier. Ordering follows urgency: `Low < Med < High`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Med,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Med => "med",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "med" | "medium" => Ok(Priority::Med),
            "high" => Ok(Priority::High),
            other => Err(ValidationError::invalid(
                "priority",
                format!("expected low, med or high, got '{other}'"),
            )),
        }
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Blocked,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "doing" => Ok(TaskStatus::Doing),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            other => Err(ValidationError::invalid(
                "status",
                format!("expected todo, doing, blocked or done, got '{other}'"),
            )),
        }
    }
}

/// A unit of work waiting to be placed on the calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub priority: Priority,
    /// Estimated effort in minutes; always positive.
    pub est_minutes: u32,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    /// When set, no scheduled minute may fall after `due_at`.
    #[serde(default)]
    pub hard_deadline: bool,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Task {
    /// Create a `todo` task with a fresh id.
    pub fn new(title: impl Into<String>, est_minutes: u32) -> Result<Self, ValidationError> {
        let task = Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            notes: String::new(),
            priority: Priority::default(),
            est_minutes,
            due_at: None,
            hard_deadline: false,
            status: TaskStatus::Todo,
            tags: Vec::new(),
        };
        task.validate()?;
        Ok(task)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set a soft due date.
    pub fn with_due(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self.hard_deadline = false;
        self
    }

    /// Set a due date that scheduling must never exceed.
    pub fn with_hard_deadline(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self.hard_deadline = true;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Re-check invariants for tasks that arrived via deserialization or a store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::invalid("id", "must not be empty"));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::invalid("title", "must not be empty"));
        }
        if self.est_minutes == 0 {
            return Err(ValidationError::invalid(
                "est_minutes",
                format!("task '{}' must have a positive estimate", self.id),
            ));
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status != TaskStatus::Done
    }

    /// The instant scheduled work must not exceed, if any.
    pub fn hard_due(&self) -> Option<DateTime<Utc>> {
        if self.hard_deadline {
            self.due_at
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_rejects_zero_estimate_and_blank_title() {
        assert!(Task::new("Write intro", 0).is_err());
        assert!(Task::new("   ", 30).is_err());
        let task = Task::new("Write intro", 30).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::Med);
        assert!(task.is_pending());
    }

    #[test]
    fn priority_orders_by_urgency() {
        assert!(Priority::High > Priority::Med);
        assert!(Priority::Med > Priority::Low);
    }

    #[test]
    fn text_forms_round_trip() {
        for p in [Priority::Low, Priority::Med, Priority::High] {
            assert_eq!(p.as_str().parse::<Priority>().unwrap(), p);
        }
        for s in [TaskStatus::Todo, TaskStatus::Doing, TaskStatus::Blocked, TaskStatus::Done] {
            assert_eq!(s.as_str().parse::<TaskStatus>().unwrap(), s);
        }
        assert_eq!("Medium".parse::<Priority>().unwrap(), Priority::Med);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn hard_due_only_when_flagged() {
        let due = Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap();
        let soft = Task::new("Edit video", 60).unwrap().with_due(due);
        assert_eq!(soft.hard_due(), None);
        let hard = soft.with_hard_deadline(due);
        assert_eq!(hard.hard_due(), Some(due));
    }

    #[test]
    fn deserializes_with_defaults() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t1","title":"Record voiceover","est_minutes":45,"priority":"high"}"#,
        )
        .unwrap();
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(!task.hard_deadline);
        assert!(task.validate().is_ok());
    }
}
