//! Automatic status transitions.
//!
//! `next_status` maps an item and an instant to the status the item should
//! have at that instant. It returns the fixed point of the transition rules,
//! so applying it again with the same `now` changes nothing.

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::{ItemStatus, SchedulableItem, Stamp, StatusUpdate};

/// Tunables for the automatic transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// How long after its anchor an item without an end time auto-completes
    pub grace_window: TimeDelta,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_window: TimeDelta::hours(2),
        }
    }
}

impl LifecycleConfig {
    pub fn new(grace_window: TimeDelta) -> Self {
        Self { grace_window }
    }

    /// Set the grace window
    pub fn with_grace_window(mut self, grace_window: TimeDelta) -> Self {
        self.grace_window = grace_window;
        self
    }
}

/// Instant at which an in-progress item completes on its own
pub fn completion_due(item: &SchedulableItem, config: &LifecycleConfig) -> DateTime<Utc> {
    match item.end_time {
        Some(end) => end,
        None => item
            .anchor_time
            .checked_add_signed(config.grace_window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

/// Status `item` should have at `now`
pub fn next_status(item: &SchedulableItem, now: DateTime<Utc>, config: &LifecycleConfig) -> ItemStatus {
    if item.cancelled {
        return item.status;
    }

    let started = now >= item.anchor_time;
    let finished = now >= completion_due(item, config);

    match item.status {
        ItemStatus::Pending if started && finished => ItemStatus::Completed,
        ItemStatus::Pending if started => ItemStatus::InProgress,
        ItemStatus::InProgress if finished => ItemStatus::Completed,
        status => status,
    }
}

/// A status change computed for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub id: String,
    pub from: ItemStatus,
    pub to: ItemStatus,
    /// Set when entering Completed on an item with no completion stamp
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transition {
    pub fn is_completion(&self) -> bool {
        self.to == ItemStatus::Completed
    }

    /// The conditional write that persists this transition
    pub fn to_update(&self) -> StatusUpdate {
        StatusUpdate {
            id: self.id.clone(),
            expected: self.from,
            status: self.to,
            completed_at: self.completed_at.map(Stamp::SetIfUnset).unwrap_or(Stamp::Keep),
            cancelled: None,
        }
    }

    /// Apply to an in-memory snapshot
    pub fn apply(&self, item: &mut SchedulableItem) {
        item.status = self.to;
        if item.completed_at.is_none() {
            item.completed_at = self.completed_at;
        }
    }
}

/// The transition `item` should take at `now`, if any
pub fn evaluate(item: &SchedulableItem, now: DateTime<Utc>, config: &LifecycleConfig) -> Option<Transition> {
    let to = next_status(item, now, config);
    if to == item.status {
        return None;
    }

    let completed_at = (to == ItemStatus::Completed && item.completed_at.is_none()).then_some(now);
    Some(Transition {
        id: item.id.clone(),
        from: item.status,
        to,
        completed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn config() -> LifecycleConfig {
        LifecycleConfig::default()
    }

    #[test]
    fn test_default_grace_window_is_two_hours() {
        assert_eq!(LifecycleConfig::default().grace_window, TimeDelta::hours(2));
    }

    #[test]
    fn test_pending_before_anchor_stays_pending() {
        let task = SchedulableItem::task("t", "x", now() + TimeDelta::minutes(1));
        assert_eq!(next_status(&task, now(), &config()), ItemStatus::Pending);
        assert!(evaluate(&task, now(), &config()).is_none());
    }

    #[test]
    fn test_pending_to_in_progress_at_anchor() {
        let task = SchedulableItem::task("t", "x", now());
        assert_eq!(next_status(&task, now(), &config()), ItemStatus::InProgress);
    }

    #[test]
    fn test_overdue_task_completes_after_grace() {
        let task = SchedulableItem::task("t", "x", now() - TimeDelta::hours(3)).with_status(ItemStatus::InProgress);
        assert_eq!(next_status(&task, now(), &config()), ItemStatus::Completed);
    }

    #[test]
    fn test_pending_task_three_hours_late_goes_straight_to_completed() {
        let task = SchedulableItem::task("t", "x", now() - TimeDelta::hours(3));
        assert_eq!(next_status(&task, now(), &config()), ItemStatus::Completed);
    }

    #[test]
    fn test_task_within_grace_stays_in_progress() {
        let task = SchedulableItem::task("t", "x", now() - TimeDelta::minutes(119)).with_status(ItemStatus::InProgress);
        assert_eq!(next_status(&task, now(), &config()), ItemStatus::InProgress);
    }

    #[test]
    fn test_grace_boundary_is_inclusive() {
        let task = SchedulableItem::task("t", "x", now() - TimeDelta::hours(2)).with_status(ItemStatus::InProgress);
        assert_eq!(next_status(&task, now(), &config()), ItemStatus::Completed);
    }

    #[test]
    fn test_custom_grace_window() {
        let task = SchedulableItem::task("t", "x", now() - TimeDelta::hours(3)).with_status(ItemStatus::InProgress);
        let config = LifecycleConfig::default().with_grace_window(TimeDelta::hours(4));
        assert_eq!(next_status(&task, now(), &config), ItemStatus::InProgress);
    }

    #[test]
    fn test_meeting_with_future_end_stays_in_progress() {
        let meeting = SchedulableItem::meeting(
            "m",
            "Review",
            now() - TimeDelta::hours(5),
            now() + TimeDelta::minutes(30),
        )
        .with_status(ItemStatus::InProgress);
        assert_eq!(next_status(&meeting, now(), &config()), ItemStatus::InProgress);
    }

    #[test]
    fn test_meeting_completes_at_end_time() {
        let meeting = SchedulableItem::meeting("m", "Review", now() - TimeDelta::hours(1), now())
            .with_status(ItemStatus::InProgress);
        assert_eq!(next_status(&meeting, now(), &config()), ItemStatus::Completed);
    }

    #[test]
    fn test_meeting_end_time_overrides_grace() {
        // Started 3h ago, still running: grace does not apply to meetings
        let meeting = SchedulableItem::meeting(
            "m",
            "Offsite",
            now() - TimeDelta::hours(3),
            now() + TimeDelta::hours(3),
        )
        .with_status(ItemStatus::InProgress);
        assert_eq!(next_status(&meeting, now(), &config()), ItemStatus::InProgress);
    }

    #[test]
    fn test_terminal_states_never_change() {
        let long_ago = now() - TimeDelta::days(30);
        for status in [ItemStatus::Completed, ItemStatus::Cancelled] {
            let task = SchedulableItem::task("t", "x", long_ago).with_status(status);
            assert_eq!(next_status(&task, now(), &config()), status);
        }
    }

    #[test]
    fn test_cancelled_flag_freezes_item() {
        let mut task = SchedulableItem::task("t", "x", now() - TimeDelta::hours(5));
        task.cancelled = true;
        assert_eq!(next_status(&task, now(), &config()), ItemStatus::Pending);
        assert!(evaluate(&task, now(), &config()).is_none());
    }

    #[test]
    fn test_next_status_is_idempotent() {
        let offsets = [-300, -121, -120, -60, -1, 0, 1, 60];
        let statuses = [ItemStatus::Pending, ItemStatus::InProgress, ItemStatus::Completed];
        for offset in offsets {
            for status in statuses {
                let anchor = now() + TimeDelta::minutes(offset);
                let mut task = SchedulableItem::task("t", "x", anchor).with_status(status);
                let once = next_status(&task, now(), &config());
                task.status = once;
                let twice = next_status(&task, now(), &config());
                assert_eq!(once, twice, "offset {offset} from {status}");
            }
        }
    }

    #[test]
    fn test_evaluate_stamps_completed_at() {
        let task = SchedulableItem::task("t", "x", now() - TimeDelta::hours(3)).with_status(ItemStatus::InProgress);
        let transition = evaluate(&task, now(), &config()).unwrap();
        assert_eq!(transition.from, ItemStatus::InProgress);
        assert_eq!(transition.to, ItemStatus::Completed);
        assert_eq!(transition.completed_at, Some(now()));
        assert!(transition.is_completion());
    }

    #[test]
    fn test_evaluate_keeps_existing_completed_at() {
        let mut task = SchedulableItem::task("t", "x", now() - TimeDelta::hours(3)).with_status(ItemStatus::InProgress);
        let earlier = now() - TimeDelta::hours(1);
        task.completed_at = Some(earlier);
        let transition = evaluate(&task, now(), &config()).unwrap();
        assert_eq!(transition.completed_at, None);

        transition.apply(&mut task);
        assert_eq!(task.completed_at, Some(earlier));
        assert_eq!(task.status, ItemStatus::Completed);
    }

    #[test]
    fn test_in_progress_transition_has_no_stamp() {
        let task = SchedulableItem::task("t", "x", now() - TimeDelta::minutes(5));
        let transition = evaluate(&task, now(), &config()).unwrap();
        assert_eq!(transition.to, ItemStatus::InProgress);
        assert_eq!(transition.completed_at, None);
        assert!(!transition.is_completion());
    }

    #[test]
    fn test_transition_to_update() {
        let task = SchedulableItem::task("t", "x", now() - TimeDelta::hours(3)).with_status(ItemStatus::InProgress);
        let update = evaluate(&task, now(), &config()).unwrap().to_update();
        assert_eq!(update.id, "t");
        assert_eq!(update.expected, ItemStatus::InProgress);
        assert_eq!(update.status, ItemStatus::Completed);
        assert_eq!(update.completed_at, Stamp::SetIfUnset(now()));
        assert_eq!(update.cancelled, None);
    }
}
