//! In-memory stores for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use storekeeper_alerts::{DueWindow, NewNotification, Notification, StockLevel};
use storekeeper_core::{ItemId, NotificationId, TenantId};

use super::{InventoryReader, NotificationStore, Pagination, StoreError};

fn poisoned() -> StoreError {
    StoreError::Unavailable("state lock poisoned".to_string())
}

/// In-memory inventory levels, keyed by (tenant, item).
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    inner: RwLock<HashMap<(TenantId, ItemId), StockLevel>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Seed or replace a level. Stands in for the external inventory
    /// management flows that own the real table.
    pub fn upsert_level(&self, tenant_id: TenantId, level: StockLevel) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, level.item_id), level);
        }
    }
}

#[async_trait]
impl InventoryReader for InMemoryInventory {
    async fn low_stock_items(
        &self,
        tenant_id: TenantId,
        threshold: i64,
    ) -> Result<Vec<StockLevel>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .iter()
            .filter(|((t, _), level)| *t == tenant_id && level.quantity <= threshold)
            .map(|(_, level)| level.clone())
            .collect())
    }
}

/// In-memory notification rows.
///
/// The dedup check and the insert of `insert_if_absent` happen under one
/// write lock, which gives the same atomicity the Postgres store gets from
/// its unique constraint.
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    inner: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }

    fn store(notification: NewNotification) -> Notification {
        Notification {
            id: NotificationId::new(),
            tenant_id: notification.tenant_id,
            item_id: notification.item_id,
            category: notification.category,
            title: notification.title,
            message: notification.message,
            due_date: notification.due_date,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert_if_absent(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, StoreError> {
        let mut rows = self.inner.write().map_err(|_| poisoned())?;

        let occupied = rows.iter().any(|row| {
            row.tenant_id == notification.tenant_id
                && row.item_id == notification.item_id
                && row.category == notification.category
        });
        if occupied {
            return Ok(None);
        }

        let stored = Self::store(notification);
        rows.push(stored.clone());
        Ok(Some(stored))
    }

    async fn insert(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let mut rows = self.inner.write().map_err(|_| poisoned())?;
        let stored = Self::store(notification);
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn list_due(
        &self,
        tenant_id: TenantId,
        window: DueWindow,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = self.inner.read().map_err(|_| poisoned())?;
        let mut due: Vec<Notification> = rows
            .iter()
            .filter(|row| {
                row.tenant_id == tenant_id && !row.is_read && window.contains(row.due_date)
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(due)
    }

    async fn list_all(
        &self,
        tenant_id: TenantId,
        pagination: Pagination,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = self.inner.read().map_err(|_| poisoned())?;
        let mut all: Vec<Notification> = rows
            .iter()
            .filter(|row| row.tenant_id == tenant_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect())
    }

    async fn mark_read(&self, id: NotificationId) -> Result<bool, StoreError> {
        let mut rows = self.inner.write().map_err(|_| poisoned())?;
        match rows.iter_mut().find(|row| row.id == id) {
            Some(row) => {
                row.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
