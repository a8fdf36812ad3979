//! Reminder offset calculator.
//!
//! Only the fire instant is computed here; delivery belongs to an external
//! notifier, which also decides what to do with reminders already overdue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Channel, ReminderSpec, SchedulableItem};

/// Instant the reminder described by `spec` fires for an item anchored at `anchor`
pub fn fire_at(spec: &ReminderSpec, anchor: DateTime<Utc>) -> DateTime<Utc> {
    anchor
        .checked_sub_signed(spec.offset())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// What the notification layer receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderNotice {
    pub item_id: String,
    pub fire_at: DateTime<Utc>,
    pub channel: Channel,
}

impl ReminderNotice {
    /// Returns true if the fire instant has already passed at `now`
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.fire_at < now
    }
}

/// Notice for `item`'s reminder, if it has an enabled one
pub fn notice_for(item: &SchedulableItem) -> Option<ReminderNotice> {
    let spec = item.reminder.as_ref().filter(|r| r.is_enabled())?;
    Some(ReminderNotice {
        item_id: item.id.clone(),
        fire_at: fire_at(spec, item.anchor_time),
        channel: spec.channel(),
    })
}

/// Notices whose fire instant is at or before `now`, oldest first.
///
/// Overdue reminders are included; `ReminderNotice::is_overdue` tells the
/// notifier which ones they are.
pub fn due_by<'a>(items: impl IntoIterator<Item = &'a SchedulableItem>, now: DateTime<Utc>) -> Vec<ReminderNotice> {
    let mut notices: Vec<ReminderNotice> = items
        .into_iter()
        .filter_map(notice_for)
        .filter(|n| n.fire_at <= now)
        .collect();
    notices.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.item_id.cmp(&b.item_id)));
    notices
}
