//! Store interfaces the scheduler reads from and commits into, plus the
//! in-memory and SQLite implementations.

mod config;
pub mod memory;
pub mod schedule_db;

pub use config::{Config, SchedulerSection};
pub use memory::MemoryStore;
pub use schedule_db::ScheduleDb;

use std::path::PathBuf;

use crate::error::DatabaseError;
use crate::schedule::{AvailabilityRule, Provenance, TimeBlock};
use crate::task::Task;

/// Read access to a user's tasks.
pub trait TaskStore {
    /// All tasks for the user whose status is not `done`.
    fn list_pending_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError>;
}

/// Read access to a user's weekly availability.
pub trait AvailabilityStore {
    fn availability_rules(&self, user_id: &str) -> Result<Vec<AvailabilityRule>, DatabaseError>;
}

/// Committed time blocks.
pub trait BlockStore {
    /// Blocks for the user sorted by start time, optionally filtered by provenance.
    fn list_blocks(
        &self,
        user_id: &str,
        provenance: Option<Provenance>,
    ) -> Result<Vec<TimeBlock>, DatabaseError>;

    /// Atomically delete every `auto` block of the user and insert `blocks`
    /// as `auto`. `manual` blocks are left alone. Fails with
    /// `ManualBlockConflict` if a new block overlaps a `manual` block seen
    /// inside the same write. On error nothing changes.
    ///
    /// Returns the number of blocks inserted.
    fn replace_auto_blocks(&self, user_id: &str, blocks: &[TimeBlock]) -> Result<usize, DatabaseError>;
}

/// Everything the schedule manager needs from persistence.
pub trait ScheduleStore: TaskStore + AvailabilityStore + BlockStore {}

impl<T: TaskStore + AvailabilityStore + BlockStore + ?Sized> ScheduleStore for T {}

impl<T: TaskStore + ?Sized> TaskStore for &T {
    fn list_pending_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        (**self).list_pending_tasks(user_id)
    }
}

impl<T: AvailabilityStore + ?Sized> AvailabilityStore for &T {
    fn availability_rules(&self, user_id: &str) -> Result<Vec<AvailabilityRule>, DatabaseError> {
        (**self).availability_rules(user_id)
    }
}

impl<T: BlockStore + ?Sized> BlockStore for &T {
    fn list_blocks(
        &self,
        user_id: &str,
        provenance: Option<Provenance>,
    ) -> Result<Vec<TimeBlock>, DatabaseError> {
        (**self).list_blocks(user_id, provenance)
    }

    fn replace_auto_blocks(&self, user_id: &str, blocks: &[TimeBlock]) -> Result<usize, DatabaseError> {
        (**self).replace_auto_blocks(user_id, blocks)
    }
}

/// Reject `blocks` if any of them overlaps a `manual` block.
pub(crate) fn check_manual_conflicts(
    blocks: &[TimeBlock],
    existing: &[TimeBlock],
) -> Result<(), DatabaseError> {
    let manual: Vec<&TimeBlock> = existing
        .iter()
        .filter(|b| b.provenance == Provenance::Manual)
        .collect();
    for block in blocks {
        if let Some(clash) = manual.iter().find(|m| m.interval.overlaps(&block.interval)) {
            return Err(DatabaseError::ManualBlockConflict {
                block: block.interval.to_string(),
                manual: clash.interval.to_string(),
            });
        }
    }
    Ok(())
}

/// Returns the data directory.
///
/// `TIMEBLOCK_HOME` wins if set; otherwise `~/.config/timeblock`, or
/// `~/.config/timeblock-dev` when `TIMEBLOCK_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    if let Some(home) = std::env::var_os("TIMEBLOCK_HOME") {
        let dir = PathBuf::from(home);
        std::fs::create_dir_all(&dir)?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TIMEBLOCK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("timeblock-dev")
    } else {
        base_dir.join("timeblock")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
