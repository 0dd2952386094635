//! Propose/commit protocol over the schedule stores.
//!
//! `plan` only reads; `commit` replaces the user's `auto` blocks in one
//! store transaction. Commits for one user are serialized in-process;
//! different users never wait on each other. A user's lock entry lives only
//! while a commit for that user is running or waiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::clock::Clock;
use crate::error::{CoreError, DatabaseError, Result, ValidationError};
use crate::interval::Interval;
use crate::schedule::{
    CommitSummary, PlanWarning, ProposedBlock, Provenance, ScheduleProposal, TimeBlock,
};
use crate::scheduler::{AutoScheduler, SchedulerConfig};
use crate::storage::ScheduleStore;
use crate::timeline::{expand_availability, horizon_from, prioritize, DEFAULT_HORIZON_DAYS};

/// Plans and commits schedules for users of one store.
pub struct ScheduleManager<S, C> {
    store: S,
    clock: C,
    config: SchedulerConfig,
    horizon_days: u32,
    commit_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: ScheduleStore, C: Clock> ScheduleManager<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            config: SchedulerConfig::default(),
            horizon_days: DEFAULT_HORIZON_DAYS,
            commit_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Propose blocks for the default horizon: the start of the user's
    /// current day through `horizon_days` later.
    pub fn plan(&self, user_id: &str) -> Result<ScheduleProposal> {
        let horizon = horizon_from(
            self.clock.now(),
            self.clock.timezone(user_id),
            self.horizon_days,
        )?;
        self.plan_within(user_id, horizon)
    }

    /// Propose blocks inside `horizon` without writing anything.
    ///
    /// Every existing block, `auto` or `manual`, counts as occupied.
    /// Missing tasks or availability yield an empty proposal; missing
    /// availability is also reported as a warning.
    ///
    /// # Errors
    /// Returns an error for malformed tasks, rules or configuration, or if
    /// a store read fails.
    pub fn plan_within(&self, user_id: &str, horizon: Interval) -> Result<ScheduleProposal> {
        self.propose(user_id, horizon, None)
    }

    /// Like [`plan`](Self::plan), but the user's current `auto` blocks do
    /// not count as occupied, since committing the result replaces them.
    /// Only `manual` blocks are avoided.
    pub fn replan(&self, user_id: &str) -> Result<ScheduleProposal> {
        let horizon = horizon_from(
            self.clock.now(),
            self.clock.timezone(user_id),
            self.horizon_days,
        )?;
        self.replan_within(user_id, horizon)
    }

    pub fn replan_within(&self, user_id: &str, horizon: Interval) -> Result<ScheduleProposal> {
        self.propose(user_id, horizon, Some(Provenance::Manual))
    }

    fn propose(
        &self,
        user_id: &str,
        horizon: Interval,
        occupied_by: Option<Provenance>,
    ) -> Result<ScheduleProposal> {
        self.config.validate()?;

        let tasks = self.store.list_pending_tasks(user_id)?;
        for task in &tasks {
            task.validate()?;
        }

        let rules = self.store.availability_rules(user_id)?;
        let mut warnings = Vec::new();
        if rules.is_empty() {
            tracing::warn!(user_id, "no availability rules; nothing can be scheduled");
            warnings.push(PlanWarning::AvailabilityMissing {
                user_id: user_id.to_string(),
            });
        }

        let availability = expand_availability(&rules, &horizon)?;
        let occupied: Vec<Interval> = self
            .store
            .list_blocks(user_id, occupied_by)?
            .into_iter()
            .map(|block| block.interval)
            .collect();

        let ordered = prioritize(tasks);
        let placement =
            AutoScheduler::with_config(self.config.clone()).place(&ordered, &availability, &occupied);

        tracing::info!(
            user_id,
            tasks = ordered.len(),
            windows = availability.len(),
            blocks = placement.blocks.len(),
            unscheduled = placement.unscheduled.len(),
            "plan computed"
        );

        Ok(ScheduleProposal {
            user_id: user_id.to_string(),
            horizon,
            blocks: placement.blocks,
            unscheduled: placement.unscheduled,
            warnings,
        })
    }

    /// Replace the user's `auto` blocks with `blocks`.
    ///
    /// The payload must be internally non-overlapping and must not overlap
    /// any `manual` block present when the store writes it. Either every old
    /// `auto` block is removed and every new one inserted, or nothing changes.
    ///
    /// # Errors
    /// `Validation` for a bad payload, `ConcurrentCommitConflict` if the
    /// store stayed locked, `Persistence` for any other store failure.
    pub fn commit(&self, user_id: &str, blocks: &[ProposedBlock]) -> Result<CommitSummary> {
        let intervals = blocks
            .iter()
            .map(ProposedBlock::interval)
            .collect::<Result<Vec<_>, ValidationError>>()?;
        check_disjoint(&intervals)?;

        let new_blocks: Vec<TimeBlock> = blocks
            .iter()
            .zip(&intervals)
            .map(|(block, interval)| TimeBlock::new(block.task_id.clone(), *interval, Provenance::Auto))
            .collect();

        let lock = self.commit_lock(user_id);
        let replaced = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.store.replace_auto_blocks(user_id, &new_blocks)
        };
        drop(lock);
        self.release_commit_lock(user_id);

        let committed_count = replaced.map_err(|err| match err {
            DatabaseError::Locked => CoreError::ConcurrentCommitConflict {
                user_id: user_id.to_string(),
            },
            DatabaseError::ManualBlockConflict { block, manual } => {
                ValidationError::OverlappingBlocks {
                    first: block,
                    second: format!("manual block {manual}"),
                }
                .into()
            }
            other => CoreError::Persistence(other),
        })?;

        tracing::info!(user_id, committed_count, "auto blocks replaced");
        Ok(CommitSummary { committed_count })
    }

    fn commit_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .commit_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    /// Drop the user's entry once no other commit holds or waits on it.
    fn release_commit_lock(&self, user_id: &str) {
        let mut locks = self
            .commit_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(user_id);
        }
    }
}

/// Reject payloads in which any two intervals overlap.
fn check_disjoint(intervals: &[Interval]) -> Result<(), ValidationError> {
    let mut sorted: Vec<&Interval> = intervals.iter().collect();
    sorted.sort();

    let mut latest: Option<&Interval> = None;
    for interval in sorted {
        if let Some(prev) = latest {
            if prev.overlaps(interval) {
                return Err(ValidationError::OverlappingBlocks {
                    first: prev.to_string(),
                    second: interval.to_string(),
                });
            }
        }
        if latest.map_or(true, |prev| interval.end() > prev.end()) {
            latest = Some(interval);
        }
    }
    Ok(())
}
