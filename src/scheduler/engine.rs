//! Scheduler - periodic evaluation of active items.
//!
//! The scheduler is the only component that does I/O. It reads snapshots
//! through an `ItemStore`, asks the lifecycle functions what should change,
//! and writes back conditional updates. Ticks never overlap: the run loop
//! skips missed ticks, and a tick requested while another is in flight
//! returns `TickOutcome::Skipped`.
//!
//! A recurring item's completion and its successor are written in one store
//! step. If that step fails or the tick is abandoned first, the item stays
//! active and the next tick completes it again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::events::SchedulerEvent;
use super::tick::{SchedulerConfig, TickOutcome, TickReport, TickState};
use crate::clock::Clock;
use crate::domain::{CasOutcome, MaterializationRequest, MaterializeOutcome, SchedulableItem, StatusUpdate};
use crate::error::{EngineError, Result};
use crate::lifecycle::{UserCommand, command_update, evaluate};
use crate::occurrence::next_after;
use crate::reminder::due_by;
use crate::store::ItemStore;

/// Clears the in-flight flag when a tick ends, including when it is dropped
/// by a timeout.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives status transitions, materialization and reminders.
pub struct Scheduler {
    store: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    events: Option<mpsc::Sender<SchedulerEvent>>,
    state: AsyncMutex<TickState>,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler with the default configuration.
    pub fn new(store: Arc<dyn ItemStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            config: SchedulerConfig::default(),
            events: None,
            state: AsyncMutex::new(TickState::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Report events on `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<SchedulerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Snapshot of the tick bookkeeping
    pub async fn state(&self) -> TickState {
        self.state.lock().await.clone()
    }

    /// Run ticks every `tick_interval` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let period = self.config.tick_interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!(
            "Scheduler started: tick every {:?}, batch size {}",
            period,
            self.config.batch_size
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => match self.tick_with_timeout().await {
                    Ok(TickOutcome::Completed(report)) if !report.is_idle() => {
                        log::info!(
                            "Tick: {} transitioned, {} materialized, {} reminders, {} failed",
                            report.transitioned,
                            report.materialized,
                            report.reminders,
                            report.failed
                        );
                    }
                    Ok(TickOutcome::Completed(_)) => {}
                    Ok(TickOutcome::Skipped) => log::debug!("Tick skipped, previous tick still running"),
                    Err(e) => log::warn!("Tick failed: {}", e),
                },
            }
        }

        log::info!("Scheduler stopped");
        Ok(())
    }

    /// One tick, abandoned if it runs past `tick_timeout`.
    ///
    /// Every store write is a single conditional or keyed step, so an
    /// abandoned tick leaves nothing that the next tick cannot finish.
    pub async fn tick_with_timeout(&self) -> Result<TickOutcome> {
        let timeout = self.config.tick_timeout;
        tokio::time::timeout(timeout, self.tick())
            .await
            .map_err(|_| EngineError::Timeout(timeout))?
    }

    /// Perform one tick now.
    pub async fn tick(&self) -> Result<TickOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(TickOutcome::Skipped);
        }
        let _guard = InFlight(&self.in_flight);

        let report = self.run_tick().await?;
        Ok(TickOutcome::Completed(report))
    }

    async fn run_tick(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.tick();

        let mut report = TickReport::new(now);
        let page = self
            .store
            .fetch_active(state.cursor.as_deref(), self.config.batch_size)
            .await?;
        report.scanned = page.len();

        for item in &page {
            self.process_item(item, now, &mut report).await;
        }

        for notice in due_by(&page, now) {
            if !state.reminder_unreported(&notice) {
                continue;
            }
            tracing::info!(
                item_id = %notice.item_id,
                fire_at = %notice.fire_at,
                channel = ?notice.channel,
                overdue = notice.is_overdue(now),
                "Reminder due"
            );
            report.reminders += 1;
            self.emit(SchedulerEvent::ReminderDue(notice.clone())).await;
            state.mark_reported(&notice);
        }

        state.advance(
            page.len(),
            page.last().map(|item| item.id.as_str()),
            self.config.batch_size,
        );
        state.finish(&report);

        tracing::debug!(
            tick = state.tick_count,
            scanned = report.scanned,
            transitioned = report.transitioned,
            conflicts = report.conflicts,
            failed = report.failed,
            materialized = report.materialized,
            "Tick finished"
        );
        Ok(report)
    }

    /// Evaluate one item and persist its transition, if any.
    async fn process_item(&self, item: &SchedulableItem, now: DateTime<Utc>, report: &mut TickReport) {
        let Some(transition) = evaluate(item, now, &self.config.lifecycle) else {
            return;
        };
        let next = if transition.is_completion() { next_request(item) } else { None };

        match self.write(&transition.to_update(), next.as_ref()).await {
            Ok((CasOutcome::Applied, created)) => {
                tracing::info!(
                    item_id = %item.id,
                    from = %transition.from,
                    to = %transition.to,
                    "Item transitioned"
                );
                report.transitioned += 1;
                self.emit(SchedulerEvent::Transitioned {
                    item_id: item.id.clone(),
                    from: transition.from,
                    to: transition.to,
                    at: now,
                })
                .await;
                if let (Some(request), Some(created)) = (next, created) {
                    match created {
                        MaterializeOutcome::Created => report.materialized += 1,
                        MaterializeOutcome::AlreadyExists => report.already_materialized += 1,
                    }
                    self.announce(request, created).await;
                }
            }
            Ok((CasOutcome::Conflict { actual }, _)) => {
                tracing::debug!(
                    item_id = %item.id,
                    expected = %transition.from,
                    actual = %actual,
                    "Status changed concurrently, skipping"
                );
                report.conflicts += 1;
            }
            Ok((CasOutcome::Missing, _)) => {
                tracing::debug!(item_id = %item.id, "Item removed concurrently, skipping");
                report.conflicts += 1;
            }
            Err(e) => {
                tracing::warn!(item_id = %item.id, error = %e, "Status update failed, will retry next tick");
                report.failed += 1;
            }
        }
    }

    /// Conditional write of `update`, together with the successor `next`
    /// when there is one.
    async fn write(
        &self,
        update: &StatusUpdate,
        next: Option<&MaterializationRequest>,
    ) -> Result<(CasOutcome, Option<MaterializeOutcome>)> {
        match next {
            Some(request) => self.store.complete_and_materialize(update, request).await,
            None => Ok((self.store.compare_and_set(update).await?, None)),
        }
    }

    async fn announce(&self, request: MaterializationRequest, outcome: MaterializeOutcome) {
        match outcome {
            MaterializeOutcome::Created => {
                tracing::info!(
                    template_id = %request.template_id,
                    item_id = %request.item.id,
                    occurrence = %request.occurrence,
                    "Materialized next occurrence"
                );
                self.emit(SchedulerEvent::Materialized {
                    template_id: request.template_id,
                    item_id: request.item.id,
                    occurrence: request.occurrence,
                })
                .await;
            }
            MaterializeOutcome::AlreadyExists => {
                tracing::debug!(item_id = %request.item.id, "Occurrence already materialized");
            }
        }
    }

    /// Apply an explicit user command to the item `id`.
    ///
    /// Written through the same conditional update as the tick, so a
    /// command racing the scheduler comes back as `CasOutcome::Conflict`.
    /// Completing a recurring item materializes its next instance in the
    /// same write.
    pub async fn apply_command(&self, id: &str, command: UserCommand) -> Result<CasOutcome> {
        let item = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::ItemNotFound(id.to_string()))?;
        let now = self.clock.now();
        let update = command_update(&item, command, now)?;
        let next = if command == UserCommand::Complete { next_request(&item) } else { None };

        let (outcome, created) = self.write(&update, next.as_ref()).await?;
        if outcome != CasOutcome::Applied {
            log::debug!("{} on {} not applied: {:?}", command, id, outcome);
            return Ok(outcome);
        }

        log::info!("Applied {} to {} ({} -> {})", command, id, update.expected, update.status);
        self.emit(SchedulerEvent::Transitioned {
            item_id: item.id.clone(),
            from: update.expected,
            to: update.status,
            at: now,
        })
        .await;

        if let (Some(request), Some(created)) = (next, created) {
            self.announce(request, created).await;
        }
        Ok(outcome)
    }

    async fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).await.is_err() {
                log::debug!("Scheduler event receiver dropped");
            }
        }
    }
}

/// Materialization request for the occurrence after `item` in its series
fn next_request(item: &SchedulableItem) -> Option<MaterializationRequest> {
    let rule = item.recurrence.as_ref()?;
    let next = next_after(rule, item.series_origin(), item.anchor_time)?;
    MaterializationRequest::for_occurrence(item, next)
}
