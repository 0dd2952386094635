//! In-memory store for tests and embedding.
//!
//! All state sits behind one mutex, so `replace_auto_blocks` builds the new
//! block list first and swaps it in only when nothing failed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{check_manual_conflicts, AvailabilityStore, BlockStore, TaskStore};
use crate::error::DatabaseError;
use crate::interval::Interval;
use crate::schedule::{AvailabilityRule, Provenance, TimeBlock};
use crate::task::{Task, TaskStatus};

#[derive(Debug, Default)]
struct MemoryState {
    tasks: HashMap<String, Vec<Task>>,
    rules: HashMap<String, Vec<AvailabilityRule>>,
    blocks: HashMap<String, Vec<TimeBlock>>,
}

/// Mutex-guarded in-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_next_replace: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, DatabaseError> {
        self.state
            .lock()
            .map_err(|_| DatabaseError::QueryFailed("memory store mutex poisoned".to_string()))
    }

    /// Insert or replace a task (matched by id).
    pub fn upsert_task(&self, user_id: &str, task: Task) -> Result<(), DatabaseError> {
        let mut state = self.lock()?;
        let tasks = state.tasks.entry(user_id.to_string()).or_default();
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => tasks.push(task),
        }
        Ok(())
    }

    pub fn set_task_status(
        &self,
        user_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<bool, DatabaseError> {
        let mut state = self.lock()?;
        let found = state
            .tasks
            .get_mut(user_id)
            .and_then(|tasks| tasks.iter_mut().find(|t| t.id == task_id))
            .map(|task| task.status = status)
            .is_some();
        Ok(found)
    }

    pub fn add_rule(&self, rule: AvailabilityRule) -> Result<(), DatabaseError> {
        let mut state = self.lock()?;
        state.rules.entry(rule.user_id.clone()).or_default().push(rule);
        Ok(())
    }

    /// Record a user-created block. Returns its id.
    pub fn add_manual_block(
        &self,
        user_id: &str,
        task_id: &str,
        interval: Interval,
    ) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let mut block = TimeBlock::new(task_id, interval, Provenance::Manual);
        block.id = Some(id.clone());
        let mut state = self.lock()?;
        state.blocks.entry(user_id.to_string()).or_default().push(block);
        Ok(id)
    }

    /// Make the next `replace_auto_blocks` call fail after it has prepared
    /// its changes.
    pub fn fail_next_replace(&self) {
        self.fail_next_replace.store(true, Ordering::SeqCst);
    }
}

impl TaskStore for MemoryStore {
    fn list_pending_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        let state = self.lock()?;
        Ok(state
            .tasks
            .get(user_id)
            .map(|tasks| tasks.iter().filter(|t| t.is_pending()).cloned().collect())
            .unwrap_or_default())
    }
}

impl AvailabilityStore for MemoryStore {
    fn availability_rules(&self, user_id: &str) -> Result<Vec<AvailabilityRule>, DatabaseError> {
        let state = self.lock()?;
        Ok(state.rules.get(user_id).cloned().unwrap_or_default())
    }
}

impl BlockStore for MemoryStore {
    fn list_blocks(
        &self,
        user_id: &str,
        provenance: Option<Provenance>,
    ) -> Result<Vec<TimeBlock>, DatabaseError> {
        let state = self.lock()?;
        let mut blocks: Vec<TimeBlock> = state
            .blocks
            .get(user_id)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| provenance.map_or(true, |p| b.provenance == p))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        blocks.sort_by_key(|b| b.interval);
        Ok(blocks)
    }

    fn replace_auto_blocks(&self, user_id: &str, blocks: &[TimeBlock]) -> Result<usize, DatabaseError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.blocks.get(user_id) {
            check_manual_conflicts(blocks, existing)?;
        }

        let mut next: Vec<TimeBlock> = state
            .blocks
            .get(user_id)
            .map(|existing| {
                existing
                    .iter()
                    .filter(|b| b.provenance == Provenance::Manual)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        next.extend(blocks.iter().map(|block| TimeBlock {
            id: Some(Uuid::new_v4().to_string()),
            task_id: block.task_id.clone(),
            interval: block.interval,
            provenance: Provenance::Auto,
        }));

        if self.fail_next_replace.swap(false, Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed(
                "injected failure during replace".to_string(),
            ));
        }

        state.blocks.insert(user_id.to_string(), next);
        Ok(blocks.len())
    }
}
