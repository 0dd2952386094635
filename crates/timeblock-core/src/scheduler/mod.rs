//! Automatic placement of tasks into time blocks.
//!
//! This module provides greedy scheduling of prioritized tasks into free time:
//! - Splits each task into chunks of at most `max_block_minutes`
//! - Walks availability windows in chronological order, resuming each window
//!   after the last block placed in it plus a break
//! - Keeps a break between consecutive chunks of one task even when they land
//!   in different (touching or overlapping) windows
//! - Avoids existing blocks and blocks placed earlier in the same run
//! - Never lets a hard-deadline task run past its due time
//!
//! Whatever does not fit is reported as unscheduled, not as an error.

mod transaction;

pub use transaction::ScheduleManager;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::interval::Interval;
use crate::schedule::{ProposedBlock, UnscheduledTask};
use crate::task::Task;

/// Default upper bound on a single block (minutes)
pub const MAX_BLOCK_MINUTES: u32 = 90;
/// Default gap left after each placed block (minutes)
pub const BREAK_MINUTES: u32 = 15;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Longest block a single chunk may occupy (minutes)
    pub max_block_minutes: u32,
    /// Break inserted after a block before the same window is reused (minutes)
    pub break_minutes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_block_minutes: MAX_BLOCK_MINUTES,
            break_minutes: BREAK_MINUTES,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_block_minutes == 0 {
            return Err(ValidationError::invalid("max_block_minutes", "must be positive"));
        }
        Ok(())
    }
}

/// Result of one placement run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub blocks: Vec<ProposedBlock>,
    pub unscheduled: Vec<UnscheduledTask>,
}

/// Free window plus the earliest instant still usable inside it.
#[derive(Debug, Clone, Copy)]
struct WindowCursor {
    window: Interval,
    next_start: DateTime<Utc>,
}

impl WindowCursor {
    fn new(window: Interval) -> Self {
        Self {
            window,
            next_start: window.start(),
        }
    }
}

/// Greedy block placer
pub struct AutoScheduler {
    config: SchedulerConfig,
}

impl AutoScheduler {
    /// Create a new scheduler with default config
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
        }
    }

    /// Create with custom config
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Place `tasks` into `availability`.
    ///
    /// # Arguments
    /// * `tasks` - Tasks already in placement order
    /// * `availability` - Free windows sorted by start
    /// * `occupied` - Existing blocks that must not be overlapped
    ///
    /// Identical inputs always produce an identical placement.
    pub fn place(&self, tasks: &[Task], availability: &[Interval], occupied: &[Interval]) -> Placement {
        let max_chunk = i64::from(self.config.max_block_minutes.max(1));
        let break_gap = Duration::minutes(i64::from(self.config.break_minutes));

        let mut cursors: Vec<WindowCursor> = availability.iter().copied().map(WindowCursor::new).collect();
        let mut occupied: Vec<Interval> = occupied.to_vec();
        let mut placement = Placement::default();

        for task in tasks {
            let mut remaining = i64::from(task.est_minutes);
            let mut not_before: Option<DateTime<Utc>> = None;

            while remaining > 0 {
                let chunk = remaining.min(max_chunk);
                let Some((index, slot)) =
                    find_slot(&cursors, &occupied, chunk, not_before, task.hard_due())
                else {
                    break;
                };

                // the block pushed back by the break ends where the next one may start
                let resume_at = slot.shift(break_gap).end();
                cursors[index].next_start = resume_at;
                not_before = Some(resume_at);
                occupied.push(slot);
                remaining -= chunk;

                tracing::debug!(task_id = %task.id, block = %slot, "placed chunk");
                placement.blocks.push(ProposedBlock {
                    task_id: task.id.clone(),
                    task_title: task.title.clone(),
                    priority: task.priority,
                    start_time: slot.start(),
                    end_time: slot.end(),
                });
            }

            if remaining > 0 {
                tracing::warn!(
                    task_id = %task.id,
                    remaining_minutes = remaining,
                    "task not fully scheduled"
                );
                placement.unscheduled.push(UnscheduledTask {
                    task_id: task.id.clone(),
                    remaining_minutes: u32::try_from(remaining).unwrap_or(task.est_minutes),
                });
            }
        }

        placement
    }
}

impl Default for AutoScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// First window (in cursor order) that can hold `minutes` starting at or
/// after both its cursor and `not_before`, without touching `occupied` and,
/// if `deadline` is set, ending no later than it.
///
/// A candidate that collides with an occupied interval slides to the end
/// of the collision and is retried inside the same window.
fn find_slot(
    cursors: &[WindowCursor],
    occupied: &[Interval],
    minutes: i64,
    not_before: Option<DateTime<Utc>>,
    deadline: Option<DateTime<Utc>>,
) -> Option<(usize, Interval)> {
    for (index, cursor) in cursors.iter().enumerate() {
        let start = not_before.map_or(cursor.next_start, |t| t.max(cursor.next_start));
        let Ok(mut candidate) = Interval::from_minutes(start, minutes) else {
            continue;
        };
        loop {
            if candidate.end() > cursor.window.end() {
                break;
            }
            if deadline.is_some_and(|due| candidate.end() > due) {
                break;
            }
            match occupied
                .iter()
                .filter(|o| o.overlaps(&candidate))
                .map(Interval::end)
                .max()
            {
                Some(blocked_until) => candidate = candidate.shift(blocked_until - candidate.start()),
                None => return Some((index, candidate)),
            }
        }
    }
    None
}
