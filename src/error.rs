//! Error types for Cadence
//!
//! Centralized error handling using thiserror. Construction-time problems
//! with rules and reminders are `ValidationError`s; everything that can go
//! wrong while talking to the store is an `EngineError`.

use thiserror::Error;

use crate::domain::ItemStatus;

/// Malformed recurrence rule or reminder spec, raised at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Interval must be a positive integer
    #[error("interval must be >= 1, got {0}")]
    InvalidInterval(i64),

    /// Month day outside 1-31
    #[error("month day must be within 1-31, got {0}")]
    MonthDayOutOfRange(i64),

    /// Weekday identifier outside 0-6
    #[error("weekday must be within 0-6 (0 = Sunday), got {0}")]
    InvalidWeekday(i64),

    /// AfterCount end condition with n < 1
    #[error("occurrence count must be >= 1, got {0}")]
    InvalidCount(i64),

    /// Weekdays supplied for a non-weekly rule
    #[error("weekdays are only meaningful for weekly rules")]
    WeekdaysRequireWeekly,

    /// Month day supplied for a non-monthly rule
    #[error("month day is only meaningful for monthly rules")]
    MonthDayRequiresMonthly,

    /// Reminder offset below zero
    #[error("reminder offset must be >= 0, got {0}")]
    NegativeOffset(i64),

    /// Reminder offset too large to represent as a duration
    #[error("reminder offset {0} is too large")]
    OffsetTooLarge(i64),
}

/// All error types that can occur in the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rule or reminder failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Explicit command not allowed from the item's current status
    #[error("Invalid transition: cannot {command} an item that is {status}")]
    InvalidTransition { command: String, status: ItemStatus },

    /// Item not found in the store
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Store/persistence error
    #[error("Store error: {0}")]
    Store(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A tick exceeded its time budget
    #[error("Tick timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_interval_error() {
        let err = ValidationError::InvalidInterval(0);
        assert_eq!(err.to_string(), "interval must be >= 1, got 0");
    }

    #[test]
    fn test_month_day_error() {
        let err = ValidationError::MonthDayOutOfRange(32);
        assert_eq!(err.to_string(), "month day must be within 1-31, got 32");
    }

    #[test]
    fn test_validation_error_conversion() {
        let err: EngineError = ValidationError::InvalidCount(0).into();
        assert!(matches!(err, EngineError::Validation(ValidationError::InvalidCount(0))));
        assert_eq!(err.to_string(), "Validation error: occurrence count must be >= 1, got 0");
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = EngineError::InvalidTransition {
            command: "cancel".to_string(),
            status: ItemStatus::Completed,
        };
        assert_eq!(err.to_string(), "Invalid transition: cannot cancel an item that is completed");
    }

    #[test]
    fn test_item_not_found_error() {
        let err = EngineError::ItemNotFound("task-1".to_string());
        assert_eq!(err.to_string(), "Item not found: task-1");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: EngineError = json_err.into();
        assert!(matches!(err, EngineError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(EngineError::Store("locked".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
