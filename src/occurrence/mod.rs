//! Occurrence generation
//!
//! Pure functions turning a `RecurrenceRule` plus an anchor into dates:
//! - **occurrences**: lazy iterator over the whole series
//! - **generate**: the part of the series inside an inclusive window
//! - **next_after**: single-step lookahead used for materialization
//! - **Horizon**: rolling windows for display

mod calendar;
mod generator;
mod horizon;

pub use calendar::{add_months, clamped_date, days_in_month};
pub use generator::{Occurrences, generate, next_after, occurrences};
pub use horizon::{Horizon, upcoming};
