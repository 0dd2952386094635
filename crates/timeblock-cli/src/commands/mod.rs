//! Subcommand implementations and the helpers they share.

pub mod availability;
pub mod block;
pub mod commit;
pub mod config;
pub mod plan;
pub mod task;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use timeblock_core::{Config, ScheduleDb, ScheduleManager, SystemClock};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Loaded config plus the user the command acts for.
pub struct Session {
    pub config: Config,
    pub user_id: String,
    pub timezone: FixedOffset,
}

impl Session {
    pub fn load(user: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let timezone = config.timezone()?;
        let user_id = user.unwrap_or_else(|| config.user_id.clone());
        Ok(Self {
            config,
            user_id,
            timezone,
        })
    }

    /// Open the schedule database with the configured busy timeout.
    pub fn open_db(&self) -> Result<ScheduleDb, Box<dyn std::error::Error>> {
        let db = ScheduleDb::open()?;
        db.set_busy_timeout(self.config.commit_timeout())?;
        tracing::debug!(user_id = %self.user_id, "schedule database opened");
        Ok(db)
    }

    pub fn manager<'a>(
        &self,
        db: &'a ScheduleDb,
        horizon_days: u32,
    ) -> ScheduleManager<&'a ScheduleDb, SystemClock> {
        ScheduleManager::new(db, SystemClock::new(self.timezone))
            .with_config(self.config.scheduler_config())
            .with_horizon_days(horizon_days)
    }

    /// Format a timestamp in the user's timezone.
    pub fn local(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format("%a %Y-%m-%d %H:%M")
            .to_string()
    }
}

/// Parse an RFC 3339 timestamp, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD` (start of day)
/// in the given timezone.
pub fn parse_datetime(s: &str, tz: &FixedOffset) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|_| format!("invalid date/time '{s}' (expected RFC 3339 or YYYY-MM-DD HH:MM)"))?;

    tz.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("ambiguous local time '{s}'"))
}
