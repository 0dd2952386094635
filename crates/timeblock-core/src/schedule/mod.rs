//! Schedule types: weekly availability rules, time blocks and proposals.

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::interval::Interval;
use crate::task::Priority;

/// A recurring weekly window in which the user is available for work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilityRule {
    pub user_id: String,
    /// 0=Sun ... 6=Sat
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Offset of the rule's timezone from UTC, in minutes.
    #[serde(default)]
    pub tz_offset_minutes: i32,
}

impl AvailabilityRule {
    /// Create a rule, rejecting bad weekdays, empty windows and invalid offsets.
    ///
    /// Windows must end on the same day they start.
    pub fn new(
        user_id: impl Into<String>,
        weekday: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
        tz_offset_minutes: i32,
    ) -> Result<Self, ValidationError> {
        let rule = Self {
            user_id: user_id.into(),
            weekday,
            start_time,
            end_time,
            tz_offset_minutes,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.weekday > 6 {
            return Err(ValidationError::invalid(
                "weekday",
                format!("expected 0-6, got {}", self.weekday),
            ));
        }
        if self.start_time >= self.end_time {
            return Err(ValidationError::invalid(
                "end_time",
                format!(
                    "window {}-{} must end after it starts",
                    self.start_time.format("%H:%M"),
                    self.end_time.format("%H:%M")
                ),
            ));
        }
        self.timezone().map(|_| ())
    }

    pub fn timezone(&self) -> Result<FixedOffset, ValidationError> {
        offset_from_minutes(self.tz_offset_minutes)
    }
}

/// Build a `FixedOffset` from minutes east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, ValidationError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ValidationError::invalid("tz_offset", format!("{minutes} minutes is out of range")))
}

/// Parse a `±HH:MM` (or `Z`) UTC offset into minutes.
pub fn parse_utc_offset(s: &str) -> Result<i32, ValidationError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(0);
    }
    let err = || ValidationError::invalid("tz_offset", format!("expected ±HH:MM, got '{s}'"));

    let (sign, rest) = match s.chars().next() {
        Some('+') => (1, &s[1..]),
        Some('-') => (-1, &s[1..]),
        _ => return Err(err()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(err)?;
    let hours: i32 = hours.parse().map_err(|_| err())?;
    let minutes: i32 = minutes.parse().map_err(|_| err())?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(err());
    }
    Ok(sign * (hours * 60 + minutes))
}

/// Parse an `HH:MM` time of day.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| ValidationError::invalid("time", format!("expected HH:MM, got '{s}'")))
}

/// Who created a block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Generated by the scheduler; replaced wholesale on every commit
    Auto,
    /// Created by the user; never touched by the scheduler
    Manual,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Auto => "auto",
            Provenance::Manual => "manual",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Provenance::Auto),
            "manual" => Ok(Provenance::Manual),
            other => Err(ValidationError::invalid(
                "provenance",
                format!("expected auto or manual, got '{other}'"),
            )),
        }
    }
}

/// A span of time reserved for a task.
///
/// `id` is `None` until the block store has persisted it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeBlock {
    pub id: Option<String>,
    pub task_id: String,
    pub interval: Interval,
    pub provenance: Provenance,
}

impl TimeBlock {
    pub fn new(task_id: impl Into<String>, interval: Interval, provenance: Provenance) -> Self {
        Self {
            id: None,
            task_id: task_id.into(),
            interval,
            provenance,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.interval.start()
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.interval.end()
    }
}

/// A block suggested by the planner, annotated for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposedBlock {
    pub task_id: String,
    pub task_title: String,
    pub priority: Priority,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ProposedBlock {
    pub fn interval(&self) -> Result<Interval, ValidationError> {
        Interval::new(self.start_time, self.end_time)
    }

    /// Get total duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// Part of a task the planner could not fit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnscheduledTask {
    pub task_id: String,
    pub remaining_minutes: u32,
}

/// Non-fatal conditions noticed while planning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanWarning {
    /// The user has no availability rules, so nothing can be scheduled
    AvailabilityMissing { user_id: String },
}

/// The result of a plan request. Nothing in it has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleProposal {
    pub user_id: String,
    pub horizon: Interval,
    pub blocks: Vec<ProposedBlock>,
    #[serde(default)]
    pub unscheduled: Vec<UnscheduledTask>,
    #[serde(default)]
    pub warnings: Vec<PlanWarning>,
}

impl ScheduleProposal {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total minutes proposed for one task.
    pub fn scheduled_minutes(&self, task_id: &str) -> i64 {
        self.blocks
            .iter()
            .filter(|b| b.task_id == task_id)
            .map(ProposedBlock::duration_minutes)
            .sum()
    }
}

/// Outcome of a commit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitSummary {
    pub committed_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn rule_validation() {
        assert!(AvailabilityRule::new("u1", 1, hm(9, 0), hm(12, 0), 0).is_ok());
        assert!(AvailabilityRule::new("u1", 7, hm(9, 0), hm(12, 0), 0).is_err());
        assert!(AvailabilityRule::new("u1", 1, hm(12, 0), hm(9, 0), 0).is_err());
        assert!(AvailabilityRule::new("u1", 1, hm(9, 0), hm(9, 0), 0).is_err());
        assert!(AvailabilityRule::new("u1", 1, hm(9, 0), hm(12, 0), 24 * 60).is_err());
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_utc_offset("+09:00").unwrap(), 540);
        assert_eq!(parse_utc_offset("-05:30").unwrap(), -330);
        assert_eq!(parse_utc_offset("Z").unwrap(), 0);
        assert!(parse_utc_offset("09:00").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
    }

    #[test]
    fn parses_time_of_day() {
        assert_eq!(parse_time_of_day("09:30").unwrap(), hm(9, 30));
        assert!(parse_time_of_day("9h30").is_err());
    }

    #[test]
    fn provenance_text_form() {
        assert_eq!("auto".parse::<Provenance>().unwrap(), Provenance::Auto);
        assert_eq!(Provenance::Manual.to_string(), "manual");
        assert!("pinned".parse::<Provenance>().is_err());
    }

    #[test]
    fn rule_serialization() {
        let rule = AvailabilityRule::new("u1", 1, hm(9, 0), hm(12, 0), 60).unwrap();
        let json = serde_json::to_string(&rule).unwrap();
        let decoded: AvailabilityRule = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, rule);
    }
}
