//! Clock abstraction used to compute the default planning horizon.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Source of "now" and of each user's timezone.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// The user's UTC offset, used to find the start of their day.
    fn timezone(&self, user_id: &str) -> FixedOffset;
}

/// Wall clock with a single configured offset for every user.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timezone(&self, _user_id: &str) -> FixedOffset {
        self.offset
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, Utc.fix())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn timezone(&self, _user_id: &str) -> FixedOffset {
        self.offset
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn timezone(&self, user_id: &str) -> FixedOffset {
        (**self).timezone(user_id)
    }
}
