//! Recurrence rule
//!
//! A `RecurrenceRule` describes "every N days/weeks/months/years, optionally
//! on specific weekdays or a month day, ending never / on a date / after K
//! occurrences". Rules are validated once, at construction, and are
//! immutable afterwards. Deserialization goes through the same validation.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Unit the interval is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        };
        write!(f, "{}", s)
    }
}

/// When a series stops producing occurrences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EndCondition {
    /// Unbounded; generation is always limited by the caller's window
    Never,
    /// Last day (inclusive, UTC) an occurrence may fall on
    OnDate(NaiveDate),
    /// Total number of occurrences in the series, counted from the anchor
    AfterCount(u32),
}

/// Map a 0-6 identifier (0 = Sunday) to a chrono weekday
pub fn weekday_from_index(index: i64) -> Result<Weekday, ValidationError> {
    match index {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(ValidationError::InvalidWeekday(other)),
    }
}

/// Validated, immutable recurrence rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub struct RecurrenceRule {
    frequency: Frequency,
    interval: u32,
    /// Sorted Sunday-first, no duplicates
    weekdays: Vec<Weekday>,
    month_day: Option<u32>,
    end: EndCondition,
}

impl RecurrenceRule {
    /// Start building a rule with the given frequency (interval 1, never ending)
    pub fn builder(frequency: Frequency) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder::new(frequency)
    }

    /// Every day, forever
    pub fn daily() -> Self {
        Self {
            frequency: Frequency::Daily,
            interval: 1,
            weekdays: Vec::new(),
            month_day: None,
            end: EndCondition::Never,
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Requested weekdays, Sunday-first; empty means "the anchor's weekday"
    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }

    pub fn month_day(&self) -> Option<u32> {
        self.month_day
    }

    pub fn end_condition(&self) -> EndCondition {
        self.end
    }

    /// Returns true if the rule can only ever produce finitely many dates
    pub fn is_bounded(&self) -> bool {
        !matches!(self.end, EndCondition::Never)
    }
}

/// Builder for `RecurrenceRule`; all checks happen in `build()`
#[derive(Debug, Clone)]
pub struct RecurrenceRuleBuilder {
    frequency: Frequency,
    interval: i64,
    weekdays: Vec<i64>,
    month_day: Option<i64>,
    end: EndCondition,
}

impl RecurrenceRuleBuilder {
    fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            weekdays: Vec::new(),
            month_day: None,
            end: EndCondition::Never,
        }
    }

    pub fn interval(mut self, interval: i64) -> Self {
        self.interval = interval;
        self
    }

    /// Weekday identifiers 0-6, 0 = Sunday
    pub fn weekdays(mut self, days: impl IntoIterator<Item = i64>) -> Self {
        self.weekdays = days.into_iter().collect();
        self
    }

    pub fn month_day(mut self, day: i64) -> Self {
        self.month_day = Some(day);
        self
    }

    pub fn ends(mut self, end: EndCondition) -> Self {
        self.end = end;
        self
    }

    pub fn until(self, date: NaiveDate) -> Self {
        self.ends(EndCondition::OnDate(date))
    }

    pub fn count(self, n: u32) -> Self {
        self.ends(EndCondition::AfterCount(n))
    }

    pub fn build(self) -> Result<RecurrenceRule, ValidationError> {
        let interval = u32::try_from(self.interval)
            .ok()
            .filter(|i| *i >= 1)
            .ok_or(ValidationError::InvalidInterval(self.interval))?;

        if !self.weekdays.is_empty() && self.frequency != Frequency::Weekly {
            return Err(ValidationError::WeekdaysRequireWeekly);
        }
        let mut weekdays = self
            .weekdays
            .iter()
            .map(|d| weekday_from_index(*d))
            .collect::<Result<Vec<_>, _>>()?;
        weekdays.sort_by_key(|d| d.num_days_from_sunday());
        weekdays.dedup();

        let month_day = match self.month_day {
            None => None,
            Some(_) if self.frequency != Frequency::Monthly => {
                return Err(ValidationError::MonthDayRequiresMonthly);
            }
            Some(day) if (1..=31).contains(&day) => Some(day as u32),
            Some(day) => return Err(ValidationError::MonthDayOutOfRange(day)),
        };

        if let EndCondition::AfterCount(0) = self.end {
            return Err(ValidationError::InvalidCount(0));
        }

        Ok(RecurrenceRule {
            frequency: self.frequency,
            interval,
            weekdays,
            month_day,
            end: self.end,
        })
    }
}

/// Wire shape of a rule, mirroring what the UI sends
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRule {
    frequency: Frequency,
    interval: i64,
    #[serde(default)]
    weekdays: Vec<i64>,
    #[serde(default)]
    month_day: Option<i64>,
    #[serde(default = "never")]
    end: EndCondition,
}

fn never() -> EndCondition {
    EndCondition::Never
}

impl TryFrom<RawRule> for RecurrenceRule {
    type Error = ValidationError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let mut builder = RecurrenceRule::builder(raw.frequency)
            .interval(raw.interval)
            .weekdays(raw.weekdays)
            .ends(raw.end);
        if let Some(day) = raw.month_day {
            builder = builder.month_day(day);
        }
        builder.build()
    }
}

impl From<RecurrenceRule> for RawRule {
    fn from(rule: RecurrenceRule) -> Self {
        Self {
            frequency: rule.frequency,
            interval: i64::from(rule.interval),
            weekdays: rule
                .weekdays
                .iter()
                .map(|d| i64::from(d.num_days_from_sunday()))
                .collect(),
            month_day: rule.month_day.map(i64::from),
            end: rule.end,
        }
    }
}
