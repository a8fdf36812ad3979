//! Events the scheduler reports to whoever is listening

use chrono::{DateTime, Utc};

use crate::domain::ItemStatus;
use crate::reminder::ReminderNotice;

/// Event sent from the scheduler to an optional listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// An item's status was changed by the scheduler.
    Transitioned {
        item_id: String,
        from: ItemStatus,
        to: ItemStatus,
        at: DateTime<Utc>,
    },
    /// A new instance of a recurring series was created.
    Materialized {
        template_id: String,
        item_id: String,
        occurrence: DateTime<Utc>,
    },
    /// A reminder's fire instant came due.
    ReminderDue(ReminderNotice),
}

impl SchedulerEvent {
    /// Id of the item the event is about
    pub fn item_id(&self) -> &str {
        match self {
            SchedulerEvent::Transitioned { item_id, .. } => item_id,
            SchedulerEvent::Materialized { item_id, .. } => item_id,
            SchedulerEvent::ReminderDue(notice) => &notice.item_id,
        }
    }
}
