//! Lifecycle state machine
//!
//! Pending → InProgress → Completed as time passes; Cancelled and reopening
//! only through explicit user commands. Everything here is pure: the caller
//! supplies `now`.

mod commands;
mod machine;

pub use commands::{UserCommand, command_update};
pub use machine::{LifecycleConfig, Transition, completion_due, evaluate, next_status};
