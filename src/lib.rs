//! Cadence - recurrence and lifecycle engine for tasks and meetings
//!
//! Cadence expands recurrence rules into concrete occurrences, moves items
//! through their lifecycle as time passes, materializes the next instance of
//! a finished recurring item and computes when reminders fire. The pure
//! parts (`occurrence`, `lifecycle`, `reminder`) take the current instant as
//! a parameter; only the `scheduler` talks to a clock and a store.

pub mod clock;
pub mod domain;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod occurrence;
pub mod reminder;
pub mod scheduler;
pub mod store;

pub use error::{EngineError, Result, ValidationError};
