//! SQLite-based storage for tasks, availability rules and time blocks.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{check_manual_conflicts, data_dir, AvailabilityStore, BlockStore, TaskStore};
use crate::error::{CoreError, DatabaseError};
use crate::interval::Interval;
use crate::schedule::{AvailabilityRule, Provenance, TimeBlock};
use crate::task::{Task, TaskStatus};

// === Helper Functions ===

/// Wrap a decoding error for column `idx`.
fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Parse an RFC3339 column into a UTC timestamp
fn parse_datetime(idx: usize, s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Parse a `HH:MM:SS` column
fn parse_time(idx: usize, s: &str) -> Result<NaiveTime, rusqlite::Error> {
    NaiveTime::parse_from_str(s, "%H:%M:%S").map_err(|e| conversion_error(idx, e))
}

/// Format a time of day for database storage
fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

const TASK_COLUMNS: &str =
    "id, title, notes, priority, est_minutes, due_at, hard_deadline, status, tags";

/// Build a Task from a database row
fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let priority: String = row.get(3)?;
    let due_at: Option<String> = row.get(5)?;
    let status: String = row.get(7)?;
    let tags: String = row.get(8)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        notes: row.get(2)?,
        priority: priority.parse().map_err(|e| conversion_error(3, e))?,
        est_minutes: row.get(4)?,
        due_at: due_at.as_deref().map(|s| parse_datetime(5, s)).transpose()?,
        hard_deadline: row.get(6)?,
        status: status.parse().map_err(|e| conversion_error(7, e))?,
        tags: serde_json::from_str(&tags).map_err(|e| conversion_error(8, e))?,
    })
}

/// Build an AvailabilityRule from a database row (id excluded)
fn row_to_rule(row: &rusqlite::Row) -> Result<AvailabilityRule, rusqlite::Error> {
    let start: String = row.get(3)?;
    let end: String = row.get(4)?;
    Ok(AvailabilityRule {
        user_id: row.get(1)?,
        weekday: row.get(2)?,
        start_time: parse_time(3, &start)?,
        end_time: parse_time(4, &end)?,
        tz_offset_minutes: row.get(5)?,
    })
}

/// Build a TimeBlock from a database row
fn row_to_block(row: &rusqlite::Row) -> Result<TimeBlock, rusqlite::Error> {
    let start: String = row.get(2)?;
    let end: String = row.get(3)?;
    let provenance: String = row.get(4)?;
    let interval = Interval::new(parse_datetime(2, &start)?, parse_datetime(3, &end)?)
        .map_err(|e| conversion_error(3, e))?;

    Ok(TimeBlock {
        id: Some(row.get(0)?),
        task_id: row.get(1)?,
        interval,
        provenance: provenance.parse().map_err(|e| conversion_error(4, e))?,
    })
}

/// SQLite database for schedule storage.
///
/// Every row is keyed by `user_id`; one file can serve many users.
pub struct ScheduleDb {
    conn: Connection,
}

impl ScheduleDb {
    /// Open the schedule database at `<data_dir>/timeblock.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("timeblock.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (creating if needed) the database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// How long a write waits on a locked database before failing.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), DatabaseError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id            TEXT PRIMARY KEY,
                    user_id       TEXT NOT NULL,
                    title         TEXT NOT NULL,
                    notes         TEXT NOT NULL DEFAULT '',
                    priority      TEXT NOT NULL DEFAULT 'med',
                    est_minutes   INTEGER NOT NULL CHECK (est_minutes > 0),
                    due_at        TEXT,
                    hard_deadline INTEGER NOT NULL DEFAULT 0,
                    status        TEXT NOT NULL DEFAULT 'todo',
                    tags          TEXT NOT NULL DEFAULT '[]',
                    created_at    TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS availability_rules (
                    id                INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id           TEXT NOT NULL,
                    weekday           INTEGER NOT NULL CHECK (weekday BETWEEN 0 AND 6),
                    start_time        TEXT NOT NULL,
                    end_time          TEXT NOT NULL,
                    tz_offset_minutes INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS time_blocks (
                    id         TEXT PRIMARY KEY,
                    user_id    TEXT NOT NULL,
                    task_id    TEXT NOT NULL,
                    start_time TEXT NOT NULL,
                    end_time   TEXT NOT NULL,
                    provenance TEXT NOT NULL CHECK (provenance IN ('auto', 'manual'))
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_user_status ON tasks(user_id, status);
                CREATE INDEX IF NOT EXISTS idx_rules_user ON availability_rules(user_id);
                CREATE INDEX IF NOT EXISTS idx_blocks_user_provenance ON time_blocks(user_id, provenance);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    // === Task CRUD ===

    /// Create a new task.
    pub fn create_task(&self, user_id: &str, task: &Task) -> Result<(), DatabaseError> {
        let tags = serde_json::to_string(&task.tags)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO tasks (id, user_id, title, notes, priority, est_minutes, due_at, hard_deadline, status, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.id,
                user_id,
                task.title,
                task.notes,
                task.priority.as_str(),
                task.est_minutes,
                task.due_at.map(|d| d.to_rfc3339()),
                task.hard_deadline,
                task.status.as_str(),
                tags,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a task by ID.
    pub fn get_task(&self, user_id: &str, id: &str) -> Result<Option<Task>, DatabaseError> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND id = ?2"),
                params![user_id, id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// List every task of a user in creation order.
    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY rowid"
        ))?;
        let tasks = stmt
            .query_map(params![user_id], row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Change a task's status. Returns false if the task does not exist.
    pub fn update_task_status(
        &self,
        user_id: &str,
        id: &str,
        status: TaskStatus,
    ) -> Result<bool, DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE tasks SET status = ?1 WHERE user_id = ?2 AND id = ?3",
            params![status.as_str(), user_id, id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a task. Returns false if the task does not exist.
    pub fn delete_task(&self, user_id: &str, id: &str) -> Result<bool, DatabaseError> {
        let changed = self.conn.execute(
            "DELETE FROM tasks WHERE user_id = ?1 AND id = ?2",
            params![user_id, id],
        )?;
        Ok(changed > 0)
    }

    // === Availability ===

    /// Store a rule. Returns its row id.
    pub fn add_availability_rule(&self, rule: &AvailabilityRule) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO availability_rules (user_id, weekday, start_time, end_time, tz_offset_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                rule.user_id,
                rule.weekday,
                format_time(rule.start_time),
                format_time(rule.end_time),
                rule.tz_offset_minutes,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Rules of a user together with their row ids.
    pub fn list_availability_rules(
        &self,
        user_id: &str,
    ) -> Result<Vec<(i64, AvailabilityRule)>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, weekday, start_time, end_time, tz_offset_minutes
             FROM availability_rules WHERE user_id = ?1 ORDER BY weekday, start_time, id",
        )?;
        let rules = stmt
            .query_map(params![user_id], |row| Ok((row.get(0)?, row_to_rule(row)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    pub fn delete_availability_rule(&self, user_id: &str, id: i64) -> Result<bool, DatabaseError> {
        let changed = self.conn.execute(
            "DELETE FROM availability_rules WHERE user_id = ?1 AND id = ?2",
            params![user_id, id],
        )?;
        Ok(changed > 0)
    }

    // === Blocks ===

    /// Record a user-created block.
    pub fn create_manual_block(
        &self,
        user_id: &str,
        task_id: &str,
        interval: Interval,
    ) -> Result<TimeBlock, DatabaseError> {
        let mut block = TimeBlock::new(task_id, interval, Provenance::Manual);
        let id = Uuid::new_v4().to_string();
        self.insert_block(user_id, &id, &block)?;
        block.id = Some(id);
        Ok(block)
    }

    fn insert_block(&self, user_id: &str, id: &str, block: &TimeBlock) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO time_blocks (id, user_id, task_id, start_time, end_time, provenance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                user_id,
                block.task_id,
                block.start_time().to_rfc3339(),
                block.end_time().to_rfc3339(),
                block.provenance.as_str(),
            ],
        )?;
        Ok(())
    }
}

impl TaskStore for ScheduleDb {
    fn list_pending_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND status != 'done' ORDER BY rowid"
        ))?;
        let tasks = stmt
            .query_map(params![user_id], row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }
}

impl AvailabilityStore for ScheduleDb {
    fn availability_rules(&self, user_id: &str) -> Result<Vec<AvailabilityRule>, DatabaseError> {
        Ok(self
            .list_availability_rules(user_id)?
            .into_iter()
            .map(|(_, rule)| rule)
            .collect())
    }
}

impl BlockStore for ScheduleDb {
    fn list_blocks(
        &self,
        user_id: &str,
        provenance: Option<Provenance>,
    ) -> Result<Vec<TimeBlock>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, start_time, end_time, provenance
             FROM time_blocks
             WHERE user_id = ?1 AND (?2 IS NULL OR provenance = ?2)
             ORDER BY start_time, end_time, id",
        )?;
        let blocks = stmt
            .query_map(params![user_id, provenance.map(|p| p.as_str())], row_to_block)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    fn replace_auto_blocks(&self, user_id: &str, blocks: &[TimeBlock]) -> Result<usize, DatabaseError> {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        let result: Result<(), DatabaseError> = (|| {
            let manual = self.list_blocks(user_id, Some(Provenance::Manual))?;
            check_manual_conflicts(blocks, &manual)?;
            self.conn.execute(
                "DELETE FROM time_blocks WHERE user_id = ?1 AND provenance = 'auto'",
                params![user_id],
            )?;
            for block in blocks {
                let auto = TimeBlock::new(block.task_id.clone(), block.interval, Provenance::Auto);
                self.insert_block(user_id, &Uuid::new_v4().to_string(), &auto)?;
            }
            Ok(())
        })();

        match result.and_then(|()| Ok(self.conn.execute_batch("COMMIT;")?)) {
            Ok(()) => Ok(blocks.len()),
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, hour, minute, 0).unwrap()
    }

    fn iv(start: (u32, u32), end: (u32, u32)) -> Interval {
        Interval::new(at(start.0, start.1), at(end.0, end.1)).unwrap()
    }

    fn make_test_task() -> Task {
        Task::new("Record episode", 120)
            .unwrap()
            .with_priority(Priority::High)
            .with_hard_deadline(at(17, 0))
            .with_notes("studio B")
            .with_tags(vec!["podcast".to_string()])
    }

    #[test]
    fn create_and_get_task() {
        let db = ScheduleDb::open_memory().unwrap();
        let task = make_test_task();
        db.create_task("u1", &task).unwrap();

        assert_eq!(db.get_task("u1", &task.id).unwrap(), Some(task.clone()));
        assert_eq!(db.get_task("u2", &task.id).unwrap(), None);
    }

    #[test]
    fn pending_tasks_skip_done_and_keep_creation_order() {
        let db = ScheduleDb::open_memory().unwrap();
        let first = Task::new("First", 30).unwrap();
        let second = Task::new("Second", 30).unwrap();
        let third = Task::new("Third", 30).unwrap();
        for task in [&first, &second, &third] {
            db.create_task("u1", task).unwrap();
        }
        assert!(db.update_task_status("u1", &second.id, TaskStatus::Done).unwrap());

        let pending: Vec<String> = db
            .list_pending_tasks("u1")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(pending, vec![first.id.clone(), third.id.clone()]);
        assert_eq!(db.list_tasks("u1").unwrap().len(), 3);
    }

    #[test]
    fn delete_task() {
        let db = ScheduleDb::open_memory().unwrap();
        let task = make_test_task();
        db.create_task("u1", &task).unwrap();
        assert!(db.delete_task("u1", &task.id).unwrap());
        assert!(!db.delete_task("u1", &task.id).unwrap());
    }

    #[test]
    fn availability_rule_round_trip() {
        let db = ScheduleDb::open_memory().unwrap();
        let rule = AvailabilityRule::new(
            "u1",
            1,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            -300,
        )
        .unwrap();
        let id = db.add_availability_rule(&rule).unwrap();

        assert_eq!(db.availability_rules("u1").unwrap(), vec![rule]);
        assert!(db.availability_rules("u2").unwrap().is_empty());
        assert!(db.delete_availability_rule("u1", id).unwrap());
        assert!(db.availability_rules("u1").unwrap().is_empty());
    }

    #[test]
    fn replace_auto_blocks_keeps_manual() {
        let db = ScheduleDb::open_memory().unwrap();
        db.create_manual_block("u1", "standup", iv((9, 0), (9, 15))).unwrap();
        db.replace_auto_blocks(
            "u1",
            &[
                TimeBlock::new("t1", iv((10, 0), (11, 0)), Provenance::Auto),
                TimeBlock::new("t1", iv((11, 15), (12, 0)), Provenance::Auto),
            ],
        )
        .unwrap();
        let count = db
            .replace_auto_blocks("u1", &[TimeBlock::new("t2", iv((13, 0), (14, 0)), Provenance::Auto)])
            .unwrap();
        assert_eq!(count, 1);

        let all = db.list_blocks("u1", None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].provenance, Provenance::Manual);
        assert_eq!(all[1].task_id, "t2");

        let manual = db.list_blocks("u1", Some(Provenance::Manual)).unwrap();
        assert_eq!(manual.len(), 1);
        assert_eq!(manual[0].interval, iv((9, 0), (9, 15)));
    }

    #[test]
    fn replace_with_empty_clears_auto_only() {
        let db = ScheduleDb::open_memory().unwrap();
        db.create_manual_block("u1", "lunch", iv((12, 0), (13, 0))).unwrap();
        db.replace_auto_blocks("u1", &[TimeBlock::new("t1", iv((9, 0), (10, 0)), Provenance::Auto)])
            .unwrap();
        assert_eq!(db.replace_auto_blocks("u1", &[]).unwrap(), 0);
        assert!(db.list_blocks("u1", Some(Provenance::Auto)).unwrap().is_empty());
        assert_eq!(db.list_blocks("u1", Some(Provenance::Manual)).unwrap().len(), 1);
    }

    #[test]
    fn failed_replace_rolls_back() {
        let db = ScheduleDb::open_memory().unwrap();
        db.replace_auto_blocks("u1", &[TimeBlock::new("t1", iv((9, 0), (10, 0)), Provenance::Auto)])
            .unwrap();
        db.conn
            .execute_batch(
                "CREATE TRIGGER reject_t2 BEFORE INSERT ON time_blocks
                 WHEN NEW.task_id = 't2'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = db.replace_auto_blocks(
            "u1",
            &[TimeBlock::new("t2", iv((11, 0), (12, 0)), Provenance::Auto)],
        );
        assert!(result.is_err());

        let auto = db.list_blocks("u1", Some(Provenance::Auto)).unwrap();
        assert_eq!(auto.len(), 1);
        assert_eq!(auto[0].task_id, "t1");
    }

    #[test]
    fn replace_rejects_overlap_with_manual() {
        let db = ScheduleDb::open_memory().unwrap();
        db.replace_auto_blocks("u1", &[TimeBlock::new("t1", iv((9, 0), (10, 0)), Provenance::Auto)])
            .unwrap();
        db.create_manual_block("u1", "dentist", iv((10, 30), (11, 30))).unwrap();

        let result = db.replace_auto_blocks(
            "u1",
            &[TimeBlock::new("t2", iv((11, 0), (12, 0)), Provenance::Auto)],
        );
        assert!(matches!(result, Err(DatabaseError::ManualBlockConflict { .. })));

        let auto = db.list_blocks("u1", Some(Provenance::Auto)).unwrap();
        assert_eq!(auto.len(), 1);
        assert_eq!(auto[0].task_id, "t1");
        // the transaction was closed, so later writes still work
        db.replace_auto_blocks("u1", &[]).unwrap();
    }

    #[test]
    fn blocks_are_per_user() {
        let db = ScheduleDb::open_memory().unwrap();
        db.replace_auto_blocks("u1", &[TimeBlock::new("t1", iv((9, 0), (10, 0)), Provenance::Auto)])
            .unwrap();
        db.replace_auto_blocks("u2", &[]).unwrap();
        assert_eq!(db.list_blocks("u1", None).unwrap().len(), 1);
    }
}
