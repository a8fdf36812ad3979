//! Tick configuration and bookkeeping
//!
//! Each tick:
//! - Fetches one page of active items
//! - Applies due status transitions
//! - Materializes the next instance of completed recurring items
//! - Reports reminders that came due and were not reported yet

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::lifecycle::LifecycleConfig;
use crate::reminder::ReminderNotice;

/// Configuration for the scheduler loop
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between ticks
    pub tick_interval: Duration,
    /// Maximum items fetched per tick
    pub batch_size: usize,
    /// A tick running longer than this is abandoned
    pub tick_timeout: Duration,
    /// Automatic transition tunables
    pub lifecycle: LifecycleConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            batch_size: 500,
            tick_timeout: Duration::from_secs(30),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Create a new scheduler config
    pub fn new(tick_interval: Duration, batch_size: usize) -> Self {
        Self {
            tick_interval,
            batch_size: batch_size.max(1),
            ..Self::default()
        }
    }

    /// Set the per-tick timeout
    pub fn with_tick_timeout(mut self, timeout: Duration) -> Self {
        self.tick_timeout = timeout;
        self
    }

    /// Set the lifecycle config
    pub fn with_lifecycle(mut self, lifecycle: LifecycleConfig) -> Self {
        self.lifecycle = lifecycle;
        self
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Instant the tick evaluated items at
    pub now: DateTime<Utc>,
    /// Items fetched
    pub scanned: usize,
    /// Status changes written
    pub transitioned: usize,
    /// Writes that lost a race or found the item gone
    pub conflicts: usize,
    /// Items whose processing hit a store error
    pub failed: usize,
    /// New instances created
    pub materialized: usize,
    /// Materializations that found the instance already there
    pub already_materialized: usize,
    /// Reminders reported due
    pub reminders: usize,
}

impl TickReport {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            scanned: 0,
            transitioned: 0,
            conflicts: 0,
            failed: 0,
            materialized: 0,
            already_materialized: 0,
            reminders: 0,
        }
    }

    /// Returns true if the tick changed nothing and reported nothing
    pub fn is_idle(&self) -> bool {
        self.transitioned == 0 && self.materialized == 0 && self.reminders == 0 && self.failed == 0
    }
}

/// Result of asking for a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick ran to the end
    Completed(TickReport),
    /// Another tick was still in flight
    Skipped,
}

/// Reminder identity: the item and the instant it fires
type ReminderKey = (String, DateTime<Utc>);

/// State carried from one tick to the next
#[derive(Debug, Clone, Default)]
pub struct TickState {
    /// Number of ticks since start
    pub tick_count: u64,
    /// Id of the last item of the previous page; `None` starts a new pass
    pub cursor: Option<String>,
    /// Instant of the last finished tick
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Status changes written this session
    pub total_transitions: u64,
    /// Instances created this session
    pub total_materialized: u64,
    /// Per-item failures this session
    pub total_failed: u64,
    /// Reminders already handed to the notifier
    reported: HashSet<ReminderKey>,
    /// Due reminders seen during the current pass
    seen: HashSet<ReminderKey>,
}

impl TickState {
    /// Create a new tick state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new tick
    pub fn tick(&mut self) {
        self.tick_count += 1;
    }

    /// Note a due reminder; returns true if it has not been reported yet
    pub fn reminder_unreported(&mut self, notice: &ReminderNotice) -> bool {
        let key = (notice.item_id.clone(), notice.fire_at);
        let unreported = !self.reported.contains(&key);
        self.seen.insert(key);
        unreported
    }

    /// Remember that `notice` reached the notifier
    pub fn mark_reported(&mut self, notice: &ReminderNotice) {
        self.reported.insert((notice.item_id.clone(), notice.fire_at));
    }

    /// Number of reminders remembered as reported
    pub fn reported_reminders(&self) -> usize {
        self.reported.len()
    }

    /// Move the cursor past a processed page of `page_len` items ending at
    /// `last_id`.
    ///
    /// A short page ends the pass. Reported reminders not seen again during
    /// the pass belong to items that left the active set or moved their
    /// fire instant, so they are forgotten.
    pub fn advance(&mut self, page_len: usize, last_id: Option<&str>, batch_size: usize) {
        self.cursor = if page_len < batch_size {
            None
        } else {
            last_id.map(str::to_string)
        };
        if self.cursor.is_none() {
            self.reported = std::mem::take(&mut self.seen);
        }
    }

    /// Fold a finished tick into the totals
    pub fn finish(&mut self, report: &TickReport) {
        self.last_tick_at = Some(report.now);
        self.total_transitions += report.transitioned as u64;
        self.total_materialized += report.materialized as u64;
        self.total_failed += report.failed as u64;
    }
}
