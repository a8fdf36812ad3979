//! Scheduler loop.
//!
//! Periodically moves items through their lifecycle, materializes the next
//! instance of finished recurring items and reports due reminders.

mod engine;
mod events;
mod tick;

pub use engine::Scheduler;
pub use events::SchedulerEvent;
pub use tick::{SchedulerConfig, TickOutcome, TickReport, TickState};
