//! Bounded generation windows.
//!
//! Callers never expand a series without a bound: materialization asks for
//! the next single occurrence, calendar views ask for the next N days.

use chrono::{DateTime, TimeDelta, Utc};

use super::generator::{generate, occurrences};
use crate::domain::RecurrenceRule;

/// Inclusive `[start, end]` window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Horizon {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `now` through `now + days`; saturates at the end of chrono's range
    pub fn next_days(now: DateTime<Utc>, days: u32) -> Self {
        let end = TimeDelta::try_days(i64::from(days))
            .and_then(|span| now.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start: now, end }
    }

    /// The window immediately following this one, of the same length
    pub fn advance(&self) -> Self {
        let span = self.end.signed_duration_since(self.start);
        let end = self.end.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start: self.end, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Occurrences of `rule` anchored at `anchor` inside this window
    pub fn expand(&self, rule: &RecurrenceRule, anchor: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        generate(rule, anchor, self.start, self.end)
    }
}

/// Up to `limit` occurrences at or after `from`
pub fn upcoming(rule: &RecurrenceRule, anchor: DateTime<Utc>, from: DateTime<Utc>, limit: usize) -> Vec<DateTime<Utc>> {
    occurrences(rule, anchor).skip_while(|d| *d < from).take(limit).collect()
}
