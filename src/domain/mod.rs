//! Domain types for Cadence
//!
//! This module contains the data the engine reads and writes:
//! - RecurrenceRule: validated "every N units" description with an end condition
//! - SchedulableItem: snapshot of a task or meeting, plus the status machine states
//! - StatusUpdate / MaterializationRequest: the only two writes the engine issues
//! - ReminderSpec: offset and channel for an item's reminder

pub mod item;
pub mod recurrence;
pub mod reminder;

pub use item::{
    CasOutcome, ItemKind, ItemStatus, MaterializationRequest, MaterializeOutcome, SchedulableItem, SeriesRef, Stamp,
    StatusUpdate,
};
pub use recurrence::{EndCondition, Frequency, RecurrenceRule, RecurrenceRuleBuilder, weekday_from_index};
pub use reminder::{Channel, OffsetUnit, ReminderSpec};
