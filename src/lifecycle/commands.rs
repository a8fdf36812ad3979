//! Explicit user commands.
//!
//! These are the only way into Cancelled and the only way out of a terminal
//! status. They bypass `next_status` but are written through the same
//! conditional update, so a command racing the scheduler loses cleanly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ItemStatus, SchedulableItem, Stamp, StatusUpdate};
use crate::error::{EngineError, Result};

/// Command issued by the user through the UI or CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserCommand {
    /// Mark done now
    Complete,
    /// Drop the item
    Cancel,
    /// Bring a completed or cancelled item back to Pending
    Reopen,
}

impl std::fmt::Display for UserCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserCommand::Complete => "complete",
            UserCommand::Cancel => "cancel",
            UserCommand::Reopen => "reopen",
        };
        write!(f, "{}", s)
    }
}

impl UserCommand {
    /// Returns true if the command may be applied to an item in `status`
    pub fn allowed_from(&self, status: ItemStatus) -> bool {
        match self {
            UserCommand::Complete | UserCommand::Cancel => {
                matches!(status, ItemStatus::Pending | ItemStatus::InProgress)
            }
            UserCommand::Reopen => status.is_terminal(),
        }
    }
}

/// Conditional update that carries out `command` on `item` at `now`
pub fn command_update(item: &SchedulableItem, command: UserCommand, now: DateTime<Utc>) -> Result<StatusUpdate> {
    // A cancelled flag without the status is still a cancelled item
    let status = if item.cancelled {
        ItemStatus::Cancelled
    } else {
        item.status
    };

    if !command.allowed_from(status) {
        return Err(EngineError::InvalidTransition {
            command: command.to_string(),
            status,
        });
    }

    let (new_status, completed_at, cancelled) = match command {
        UserCommand::Complete => (ItemStatus::Completed, Stamp::SetIfUnset(now), None),
        UserCommand::Cancel => (ItemStatus::Cancelled, Stamp::Keep, Some(true)),
        UserCommand::Reopen => (ItemStatus::Pending, Stamp::Clear, Some(false)),
    };

    Ok(StatusUpdate {
        id: item.id.clone(),
        expected: item.status,
        status: new_status,
        completed_at,
        cancelled,
    })
}
