//! Expansion of weekly availability rules into concrete free intervals.
//!
//! Each rule is materialized on every matching calendar date inside the
//! planning horizon, using the rule's own UTC offset, then clipped to the
//! horizon. The result is sorted by start time. Overlapping rules are
//! allowed; they simply produce overlapping free intervals, and placement
//! copes with that because it checks occupancy separately.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::ValidationError;
use crate::interval::Interval;
use crate::schedule::AvailabilityRule;

/// Default planning horizon length (days)
pub const DEFAULT_HORIZON_DAYS: u32 = 7;

/// Convert a local date and time-of-day in `tz` to a UTC instant.
fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time);
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(tz.local_minus_utc()))))
}

/// Horizon running from the start of `now`'s local day for `days` days.
pub fn horizon_from(
    now: DateTime<Utc>,
    tz: FixedOffset,
    days: u32,
) -> Result<Interval, ValidationError> {
    if days == 0 {
        return Err(ValidationError::invalid("horizon_days", "must be at least 1"));
    }
    let today = now.with_timezone(&tz).date_naive();
    let start = local_to_utc(today, NaiveTime::MIN, tz);
    Interval::new(start, start + Duration::days(i64::from(days)))
}

/// Materialize `rules` over `horizon`, sorted by start ascending.
///
/// # Errors
/// Returns an error if any rule is malformed.
pub fn expand_availability(
    rules: &[AvailabilityRule],
    horizon: &Interval,
) -> Result<Vec<Interval>, ValidationError> {
    let mut windows = Vec::new();

    for rule in rules {
        rule.validate()?;
        let tz = rule.timezone()?;

        let first_day = horizon.start().with_timezone(&tz).date_naive();
        let last_day = horizon.end().with_timezone(&tz).date_naive();

        for day in first_day.iter_days().take_while(|d| *d <= last_day) {
            if day.weekday().num_days_from_sunday() != u32::from(rule.weekday) {
                continue;
            }
            let start = local_to_utc(day, rule.start_time, tz);
            let end = local_to_utc(day, rule.end_time, tz);
            let Ok(window) = Interval::new(start, end) else {
                continue;
            };
            if let Some(clipped) = window.intersection(horizon) {
                windows.push(clipped);
            }
        }
    }

    windows.sort();
    windows.dedup();
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, m, 0).unwrap()
    }

    fn rule(weekday: u8, start: NaiveTime, end: NaiveTime, offset: i32) -> AvailabilityRule {
        AvailabilityRule::new("u1", weekday, start, end, offset).unwrap()
    }

    fn week() -> Interval {
        // Monday 2026-10-19 00:00 UTC through the following Monday
        horizon_from(utc(19, 14, 30), FixedOffset::east_opt(0).unwrap(), 7).unwrap()
    }

    #[test]
    fn horizon_starts_at_local_midnight() {
        assert_eq!(utc(19, 0, 0).weekday(), Weekday::Mon);
        let h = week();
        assert_eq!(h.start(), utc(19, 0, 0));
        assert_eq!(h.end(), utc(26, 0, 0));

        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        // 20:00 UTC on the 19th is already the 20th in Tokyo
        let h = horizon_from(utc(19, 20, 0), tokyo, 1).unwrap();
        assert_eq!(h.start(), utc(19, 15, 0));
        assert_eq!(h.end(), utc(20, 15, 0));

        assert!(horizon_from(utc(19, 0, 0), tokyo, 0).is_err());
    }

    #[test]
    fn expands_weekday_rules_in_order() {
        let rules = vec![
            rule(3, hm(13, 0), hm(17, 0), 0), // Wednesday
            rule(1, hm(9, 0), hm(12, 0), 0),  // Monday
        ];
        let windows = expand_availability(&rules, &week()).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], Interval::new(utc(19, 9, 0), utc(19, 12, 0)).unwrap());
        assert_eq!(windows[1], Interval::new(utc(21, 13, 0), utc(21, 17, 0)).unwrap());
    }

    #[test]
    fn split_shifts_on_same_day() {
        let rules = vec![
            rule(1, hm(14, 0), hm(18, 0), 0),
            rule(1, hm(9, 0), hm(12, 0), 0),
        ];
        let windows = expand_availability(&rules, &week()).unwrap();
        assert_eq!(windows.len(), 2);
        assert!(windows[0].start() < windows[1].start());
    }

    #[test]
    fn overlapping_rules_are_tolerated() {
        let rules = vec![
            rule(1, hm(9, 0), hm(12, 0), 0),
            rule(1, hm(11, 0), hm(13, 0), 0),
        ];
        let windows = expand_availability(&rules, &week()).unwrap();
        assert_eq!(windows.len(), 2);
        assert!(windows[0].overlaps(&windows[1]));
    }

    #[test]
    fn rule_offset_is_applied() {
        // 09:00-12:00 at +09:00 is 00:00-03:00 UTC
        let rules = vec![rule(1, hm(9, 0), hm(12, 0), 9 * 60)];
        let windows = expand_availability(&rules, &week()).unwrap();
        assert_eq!(windows, vec![Interval::new(utc(19, 0, 0), utc(19, 3, 0)).unwrap()]);
    }

    #[test]
    fn windows_are_clipped_to_horizon() {
        let horizon = Interval::new(utc(19, 10, 0), utc(19, 11, 0)).unwrap();
        let rules = vec![rule(1, hm(9, 0), hm(12, 0), 0)];
        let windows = expand_availability(&rules, &horizon).unwrap();
        assert_eq!(windows, vec![horizon]);
    }

    #[test]
    fn no_rules_yields_nothing() {
        assert!(expand_availability(&[], &week()).unwrap().is_empty());
    }

    #[test]
    fn malformed_rule_is_rejected() {
        let mut bad = rule(1, hm(9, 0), hm(12, 0), 0);
        bad.weekday = 9;
        assert!(expand_availability(&[bad], &week()).is_err());
    }
}
