//! The store seam.
//!
//! The engine never owns item records. It reads snapshots through
//! `ItemStore` and writes back only conditional status updates and
//! key-derived new instances. Completing a recurring item writes both in
//! one step.

use async_trait::async_trait;

use crate::domain::{
    CasOutcome, ItemStatus, MaterializationRequest, MaterializeOutcome, SchedulableItem, Stamp, StatusUpdate,
};
use crate::error::Result;

/// Persistence for schedulable items
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Up to `limit` active items (not cancelled, not terminal) with an id
    /// greater than `after`, in id order.
    async fn fetch_active(&self, after: Option<&str>, limit: usize) -> Result<Vec<SchedulableItem>>;

    /// Look up one item
    async fn get(&self, id: &str) -> Result<Option<SchedulableItem>>;

    /// Insert a new item; fails if the id is taken
    async fn insert(&self, item: &SchedulableItem) -> Result<()>;

    /// All items, optionally filtered by status, in id order
    async fn list(&self, status: Option<ItemStatus>) -> Result<Vec<SchedulableItem>>;

    /// Apply `update` only if the stored status still equals `update.expected`
    async fn compare_and_set(&self, update: &StatusUpdate) -> Result<CasOutcome>;

    /// Create the instance for `request`'s key unless it already exists
    async fn materialize(&self, request: &MaterializationRequest) -> Result<MaterializeOutcome>;

    /// `compare_and_set(update)` and `materialize(next)` as one atomic step.
    ///
    /// `next` is only created when the update applies, and an error leaves
    /// neither written, so a completed item always has its successor.
    async fn complete_and_materialize(
        &self,
        update: &StatusUpdate,
        next: &MaterializationRequest,
    ) -> Result<(CasOutcome, Option<MaterializeOutcome>)>;
}

/// Apply the fields of `update` to `item`, ignoring the expected status.
pub fn apply_update(item: &mut SchedulableItem, update: &StatusUpdate) {
    item.status = update.status;
    match update.completed_at {
        Stamp::Keep => {}
        Stamp::SetIfUnset(at) => {
            if item.completed_at.is_none() {
                item.completed_at = Some(at);
            }
        }
        Stamp::Clear => item.completed_at = None,
    }
    if let Some(cancelled) = update.cancelled {
        item.cancelled = cancelled;
    }
}
