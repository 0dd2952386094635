//! Timeline preparation for the scheduler.
//!
//! This module provides:
//! - Expansion of weekly availability rules into free intervals
//! - Ordering of pending tasks for placement

mod availability;
mod priority;

pub use availability::{expand_availability, horizon_from, DEFAULT_HORIZON_DAYS};
pub use priority::{compare_tasks, prioritize};
