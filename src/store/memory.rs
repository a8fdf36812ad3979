//! In-process item store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::traits::{ItemStore, apply_update};
use crate::domain::{CasOutcome, ItemStatus, MaterializationRequest, MaterializeOutcome, SchedulableItem, StatusUpdate};
use crate::error::{EngineError, Result};

/// Items held in a `BTreeMap` keyed by id, so iteration is in id order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: Mutex<BTreeMap<String, SchedulableItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `items`
    pub fn with_items(items: impl IntoIterator<Item = SchedulableItem>) -> Self {
        let map = items.into_iter().map(|item| (item.id.clone(), item)).collect();
        Self { items: Mutex::new(map) }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, SchedulableItem>>> {
        self.items.lock().map_err(|e| EngineError::Store(e.to_string()))
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn fetch_active(&self, after: Option<&str>, limit: usize) -> Result<Vec<SchedulableItem>> {
        let items = self.lock()?;
        Ok(items
            .values()
            .filter(|item| after.is_none_or(|cursor| item.id.as_str() > cursor))
            .filter(|item| item.is_active())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<SchedulableItem>> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn insert(&self, item: &SchedulableItem) -> Result<()> {
        let mut items = self.lock()?;
        if items.contains_key(&item.id) {
            return Err(EngineError::Store(format!("Item already exists: {}", item.id)));
        }
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn list(&self, status: Option<ItemStatus>) -> Result<Vec<SchedulableItem>> {
        let items = self.lock()?;
        Ok(items
            .values()
            .filter(|item| status.is_none_or(|s| item.status == s))
            .cloned()
            .collect())
    }

    async fn compare_and_set(&self, update: &StatusUpdate) -> Result<CasOutcome> {
        let mut items = self.lock()?;
        Ok(cas(&mut items, update))
    }

    async fn materialize(&self, request: &MaterializationRequest) -> Result<MaterializeOutcome> {
        let mut items = self.lock()?;
        Ok(insert_instance(&mut items, request))
    }

    async fn complete_and_materialize(
        &self,
        update: &StatusUpdate,
        next: &MaterializationRequest,
    ) -> Result<(CasOutcome, Option<MaterializeOutcome>)> {
        let mut items = self.lock()?;
        let outcome = cas(&mut items, update);
        if outcome != CasOutcome::Applied {
            return Ok((outcome, None));
        }
        Ok((outcome, Some(insert_instance(&mut items, next))))
    }
}

fn cas(items: &mut BTreeMap<String, SchedulableItem>, update: &StatusUpdate) -> CasOutcome {
    let Some(item) = items.get_mut(&update.id) else {
        return CasOutcome::Missing;
    };
    if item.status != update.expected {
        return CasOutcome::Conflict { actual: item.status };
    }
    apply_update(item, update);
    CasOutcome::Applied
}

fn insert_instance(items: &mut BTreeMap<String, SchedulableItem>, request: &MaterializationRequest) -> MaterializeOutcome {
    let (template_id, occurrence) = request.key();
    let taken = items.contains_key(&request.item.id)
        || items
            .values()
            .any(|item| item.template_id() == template_id && item.anchor_time == occurrence);
    if taken {
        return MaterializeOutcome::AlreadyExists;
    }
    items.insert(request.item.id.clone(), request.item.clone());
    MaterializeOutcome::Created
}
