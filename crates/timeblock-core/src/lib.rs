//! # timeblock Core Library
//!
//! Automatic task-to-time-block scheduling for content planning. Given
//! pending tasks, a user's weekly availability and the blocks already on
//! their calendar, the scheduler proposes a conflict-free set of blocks and
//! later commits it in one transaction.
//!
//! ## Architecture
//!
//! - **Interval**: half-open `[start, end)` value type, validated on construction
//! - **Timeline**: weekly availability expansion and task ordering
//! - **Scheduler**: greedy chunked placement and the plan/commit manager
//! - **Storage**: store traits, an in-memory store, SQLite storage and TOML config
//!
//! ## Key Components
//!
//! - [`AutoScheduler`]: Greedy block placer
//! - [`ScheduleManager`]: Plan/commit protocol over a [`storage::ScheduleStore`]
//! - [`ScheduleDb`]: SQLite persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod interval;
pub mod schedule;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod timeline;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use interval::Interval;
pub use schedule::{
    AvailabilityRule, CommitSummary, PlanWarning, ProposedBlock, Provenance, ScheduleProposal,
    TimeBlock, UnscheduledTask,
};
pub use scheduler::{AutoScheduler, Placement, ScheduleManager, SchedulerConfig};
pub use storage::{Config, MemoryStore, ScheduleDb};
pub use task::{Priority, Task, TaskStatus};
