//! Reminder settings attached to an item

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Unit of a reminder offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetUnit {
    Minutes,
    Hours,
    Days,
}

/// Where the external notifier should deliver the reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Email,
    Both,
}

/// How long before the anchor a reminder fires, and through which channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawReminder", into = "RawReminder")]
pub struct ReminderSpec {
    offset_value: u32,
    offset_unit: OffsetUnit,
    channel: Channel,
    enabled: bool,
}

impl ReminderSpec {
    /// Validated reminder; negative or unrepresentable offsets are rejected
    pub fn new(offset_value: i64, offset_unit: OffsetUnit, channel: Channel) -> Result<Self, ValidationError> {
        if offset_value < 0 {
            return Err(ValidationError::NegativeOffset(offset_value));
        }
        let value = u32::try_from(offset_value).map_err(|_| ValidationError::OffsetTooLarge(offset_value))?;
        let spec = Self {
            offset_value: value,
            offset_unit,
            channel,
            enabled: true,
        };
        spec.try_offset().ok_or(ValidationError::OffsetTooLarge(offset_value))?;
        Ok(spec)
    }

    /// The reminder choices offered in the UI
    pub fn presets() -> Vec<ReminderSpec> {
        [
            (15, OffsetUnit::Minutes),
            (30, OffsetUnit::Minutes),
            (1, OffsetUnit::Hours),
            (2, OffsetUnit::Hours),
            (1, OffsetUnit::Days),
            (2, OffsetUnit::Days),
        ]
        .into_iter()
        .map(|(value, unit)| Self {
            offset_value: value,
            offset_unit: unit,
            channel: Channel::InApp,
            enabled: true,
        })
        .collect()
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn offset_value(&self) -> u32 {
        self.offset_value
    }

    pub fn offset_unit(&self) -> OffsetUnit {
        self.offset_unit
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Offset as a duration; always representable for a constructed spec
    pub fn offset(&self) -> TimeDelta {
        self.try_offset().unwrap_or(TimeDelta::zero())
    }

    fn try_offset(&self) -> Option<TimeDelta> {
        let value = i64::from(self.offset_value);
        match self.offset_unit {
            OffsetUnit::Minutes => TimeDelta::try_minutes(value),
            OffsetUnit::Hours => TimeDelta::try_hours(value),
            OffsetUnit::Days => TimeDelta::try_days(value),
        }
    }
}

impl Default for ReminderSpec {
    /// 15 minutes before, in-app
    fn default() -> Self {
        Self {
            offset_value: 15,
            offset_unit: OffsetUnit::Minutes,
            channel: Channel::InApp,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawReminder {
    offset_value: i64,
    offset_unit: OffsetUnit,
    channel: Channel,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl TryFrom<RawReminder> for ReminderSpec {
    type Error = ValidationError;

    fn try_from(raw: RawReminder) -> Result<Self, Self::Error> {
        let spec = ReminderSpec::new(raw.offset_value, raw.offset_unit, raw.channel)?;
        Ok(if raw.enabled { spec } else { spec.disabled() })
    }
}

impl From<ReminderSpec> for RawReminder {
    fn from(spec: ReminderSpec) -> Self {
        Self {
            offset_value: i64::from(spec.offset_value),
            offset_unit: spec.offset_unit,
            channel: spec.channel,
            enabled: spec.enabled,
        }
    }
}
