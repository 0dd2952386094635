//! Half-open time intervals `[start, end)`.
//!
//! Every scheduling computation works on [`Interval`] values. An interval
//! can only be built with `start < end`, so downstream code never has to
//! re-check for empty or inverted ranges.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A non-empty half-open time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawInterval> for Interval {
    type Error = ValidationError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        Interval::new(raw.start, raw.end)
    }
}

impl Interval {
    /// Create an interval, rejecting `start >= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Create an interval of `minutes` length beginning at `start`.
    pub fn from_minutes(start: DateTime<Utc>, minutes: i64) -> Result<Self, ValidationError> {
        Self::new(start, start + Duration::minutes(minutes))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// True iff the two intervals share any instant.
    ///
    /// Touching intervals (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True iff `inner` lies entirely within `self`.
    pub fn contains(&self, inner: &Interval) -> bool {
        self.start <= inner.start && inner.end <= self.end
    }

    /// Returns the interval moved forward (or backward, for a negative
    /// duration) by `by`. Length is preserved, so the result is always valid.
    pub fn shift(&self, by: Duration) -> Interval {
        Interval {
            start: self.start + by,
            end: self.end + by,
        }
    }

    /// The common part of two intervals, if any.
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        Interval::new(start, end).ok()
    }

    /// Split at `at` into the parts before and after it.
    ///
    /// A side is `None` when `at` falls on or outside that boundary.
    pub fn split_at(&self, at: DateTime<Utc>) -> (Option<Interval>, Option<Interval>) {
        let before = Interval::new(self.start, at.min(self.end)).ok();
        let after = Interval::new(at.max(self.start), self.end).ok();
        (before, after)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, hour, minute, 0).unwrap()
    }

    fn iv(start: (u32, u32), end: (u32, u32)) -> Interval {
        Interval::new(at(start.0, start.1), at(end.0, end.1)).unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted() {
        assert!(matches!(
            Interval::new(at(9, 0), at(9, 0)),
            Err(ValidationError::InvalidInterval { .. })
        ));
        assert!(Interval::new(at(10, 0), at(9, 0)).is_err());
        assert!(Interval::from_minutes(at(9, 0), 0).is_err());
        assert!(Interval::from_minutes(at(9, 0), -5).is_err());
    }

    #[test]
    fn overlap_is_half_open() {
        let a = iv((9, 0), (10, 0));
        assert!(a.overlaps(&iv((9, 30), (10, 30))));
        assert!(iv((9, 30), (10, 30)).overlaps(&a));
        assert!(!a.overlaps(&iv((10, 0), (11, 0))));
        assert!(!iv((8, 0), (9, 0)).overlaps(&a));
        assert!(a.overlaps(&iv((8, 0), (12, 0))));
    }

    #[test]
    fn containment_includes_equal_bounds() {
        let outer = iv((9, 0), (12, 0));
        assert!(outer.contains(&outer));
        assert!(outer.contains(&iv((9, 0), (10, 30))));
        assert!(outer.contains(&iv((10, 30), (12, 0))));
        assert!(!outer.contains(&iv((11, 0), (12, 15))));
        assert!(!outer.contains(&iv((8, 45), (9, 30))));
    }

    #[test]
    fn shift_preserves_length() {
        let block = iv((9, 0), (10, 30));
        let shifted = block.shift(Duration::minutes(15));
        assert_eq!(shifted.start(), at(9, 15));
        assert_eq!(shifted.end(), at(10, 45));
        assert_eq!(shifted.duration_minutes(), 90);
    }

    #[test]
    fn intersection_and_split() {
        let day = iv((9, 0), (12, 0));
        assert_eq!(day.intersection(&iv((11, 0), (13, 0))), Some(iv((11, 0), (12, 0))));
        assert_eq!(day.intersection(&iv((12, 0), (13, 0))), None);

        let (before, after) = day.split_at(at(10, 0));
        assert_eq!(before, Some(iv((9, 0), (10, 0))));
        assert_eq!(after, Some(iv((10, 0), (12, 0))));

        let (before, after) = day.split_at(at(9, 0));
        assert_eq!(before, None);
        assert_eq!(after, Some(day));
    }

    #[test]
    fn deserialization_enforces_invariant() {
        let ok: Interval = serde_json::from_str(
            r#"{"start":"2026-10-19T09:00:00Z","end":"2026-10-19T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(ok.duration_minutes(), 60);

        let bad = serde_json::from_str::<Interval>(
            r#"{"start":"2026-10-19T10:00:00Z","end":"2026-10-19T09:00:00Z"}"#,
        );
        assert!(bad.is_err());
    }
}
