//! Schedulable items
//!
//! A `SchedulableItem` is the engine's snapshot of a task or a meeting. The
//! store owns the record; the engine reads a possibly-stale copy for one tick
//! and only ever writes back narrow, conditional updates (`StatusUpdate`) or
//! key-derived new instances (`MaterializationRequest`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recurrence::RecurrenceRule;
use super::reminder::ReminderSpec;
use crate::id::occurrence_id;

/// Tasks have a due date; meetings have a start and an end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Task,
    Meeting,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Task => write!(f, "task"),
            ItemKind::Meeting => write!(f, "meeting"),
        }
    }
}

/// Lifecycle status shared by tasks and meetings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Anchor time not reached yet
    Pending,
    /// Anchor time reached, not finished
    InProgress,
    /// Finished, automatically or by the user
    Completed,
    /// Cancelled by the user
    Cancelled,
}

impl ItemStatus {
    /// Returns true if no automatic transition leaves this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Completed => "completed",
            ItemStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the storage/CLI spelling of a status
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ItemStatus::Pending),
            "in_progress" | "in-progress" => Some(ItemStatus::InProgress),
            "completed" => Some(ItemStatus::Completed),
            "cancelled" | "canceled" => Some(ItemStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies the series a materialized instance belongs to.
///
/// Instances point at their template by key only. `origin` is the template's
/// anchor, from which every occurrence (and the AfterCount budget) is counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRef {
    pub template_id: String,
    pub origin: DateTime<Utc>,
}

/// Engine snapshot of a task or meeting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulableItem {
    pub id: String,
    pub title: String,
    pub kind: ItemKind,
    /// Due date for tasks, start time for meetings
    pub anchor_time: DateTime<Utc>,
    /// Meetings only
    pub end_time: Option<DateTime<Utc>>,
    pub status: ItemStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub recurrence: Option<RecurrenceRule>,
    pub cancelled: bool,
    #[serde(default)]
    pub reminder: Option<ReminderSpec>,
    /// Set on materialized instances; `None` on a series template
    #[serde(default)]
    pub series: Option<SeriesRef>,
}

impl SchedulableItem {
    /// A pending task due at `due`
    pub fn task(id: impl Into<String>, title: impl Into<String>, due: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: ItemKind::Task,
            anchor_time: due,
            end_time: None,
            status: ItemStatus::Pending,
            completed_at: None,
            recurrence: None,
            cancelled: false,
            reminder: None,
            series: None,
        }
    }

    /// A pending meeting from `start` to `end`
    pub fn meeting(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: ItemKind::Meeting,
            end_time: Some(end),
            ..Self::task(id, title, start)
        }
    }

    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }

    pub fn with_reminder(mut self, reminder: ReminderSpec) -> Self {
        self.reminder = Some(reminder);
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    /// Id of the series template; the item itself when it is the template
    pub fn template_id(&self) -> &str {
        self.series.as_ref().map(|s| s.template_id.as_str()).unwrap_or(self.id.as_str())
    }

    /// Anchor the series is counted from
    pub fn series_origin(&self) -> DateTime<Utc> {
        self.series.as_ref().map(|s| s.origin).unwrap_or(self.anchor_time)
    }

    /// Returns true if the scheduler should look at this item at all
    pub fn is_active(&self) -> bool {
        !self.cancelled && !self.status.is_terminal()
    }

    /// Build the next instance of this item's series at `occurrence`.
    ///
    /// The new record keeps title, kind, rule and reminder, shifts the end
    /// time by the same duration, and starts out `Pending`. `None` if the
    /// shifted end time is out of range.
    pub fn instance_at(&self, occurrence: DateTime<Utc>) -> Option<SchedulableItem> {
        let template_id = self.template_id().to_string();
        let end_time = match self.end_time {
            Some(end) => Some(occurrence.checked_add_signed(end.signed_duration_since(self.anchor_time))?),
            None => None,
        };

        Some(SchedulableItem {
            id: occurrence_id(&template_id, occurrence),
            title: self.title.clone(),
            kind: self.kind,
            anchor_time: occurrence,
            end_time,
            status: ItemStatus::Pending,
            completed_at: None,
            recurrence: self.recurrence.clone(),
            cancelled: false,
            reminder: self.reminder.clone(),
            series: Some(SeriesRef {
                template_id,
                origin: self.series_origin(),
            }),
        })
    }
}

/// How a conditional update treats `completed_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stamp {
    /// Leave the stored value alone
    Keep,
    /// Set it, but only if it is currently unset
    SetIfUnset(DateTime<Utc>),
    /// Clear it
    Clear,
}

/// Conditional, field-level status write: applied only if the stored
/// status still equals `expected`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub id: String,
    pub expected: ItemStatus,
    pub status: ItemStatus,
    pub completed_at: Stamp,
    /// `None` leaves the cancelled flag untouched
    pub cancelled: Option<bool>,
}

/// Result of a conditional status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// Stored status matched and was replaced
    Applied,
    /// Someone else changed the status first
    Conflict { actual: ItemStatus },
    /// Item deleted meanwhile
    Missing,
}

/// Request to create the instance of a series for one occurrence.
///
/// Keyed by `(template_id, occurrence)`; the new item's id is derived from
/// that key, so repeating the request is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializationRequest {
    pub template_id: String,
    pub occurrence: DateTime<Utc>,
    pub item: SchedulableItem,
}

impl MaterializationRequest {
    /// Request for the occurrence of `source`'s series at `occurrence`
    pub fn for_occurrence(source: &SchedulableItem, occurrence: DateTime<Utc>) -> Option<Self> {
        let item = source.instance_at(occurrence)?;
        Some(Self {
            template_id: source.template_id().to_string(),
            occurrence,
            item,
        })
    }

    /// Idempotency key
    pub fn key(&self) -> (&str, DateTime<Utc>) {
        (&self.template_id, self.occurrence)
    }
}

/// Result of a materialization request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Created,
    AlreadyExists,
}
