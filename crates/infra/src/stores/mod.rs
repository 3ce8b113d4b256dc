//! Storage seams for the notification tier.
//!
//! Two backends implement these traits: in-memory stores for tests/dev and
//! Postgres stores for production. The engine is generic over both.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storekeeper_alerts::{DueWindow, NewNotification, Notification, StockLevel};
use storekeeper_core::{NotificationId, TenantId};

/// Storage operation error.
///
/// Everything here is a transient infrastructure failure (connectivity,
/// query execution). Retrying a reconcile after one is safe: the write path
/// is idempotent.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Pagination parameters for listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of rows to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50, // Safe default
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000), // Cap at 1000 for safety
            offset: offset.unwrap_or(0),
        }
    }
}

/// Read-only view of tenant inventory levels.
///
/// Inventory rows are created and updated by the external inventory
/// management flows; this service only scans them.
#[async_trait]
pub trait InventoryReader: Send + Sync {
    /// All items for the tenant at or below `threshold` units.
    async fn low_stock_items(
        &self,
        tenant_id: TenantId,
        threshold: i64,
    ) -> Result<Vec<StockLevel>, StoreError>;
}

/// Tenant-scoped notification persistence.
///
/// `insert_if_absent` must be atomic with respect to the
/// (tenant_id, item_id, category) dedup key: concurrent callers may both
/// attempt the insert, at most one may win. Rows are never deleted.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert unless a row for (tenant, item, category) already exists,
    /// regardless of that row's read state. Returns the stored notification
    /// when this call created it, `None` when deduplicated.
    async fn insert_if_absent(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, StoreError>;

    /// Insert unconditionally (reminder categories carry no dedup key).
    async fn insert(&self, notification: NewNotification) -> Result<Notification, StoreError>;

    /// Unread notifications whose due date falls inside `window`, newest
    /// first.
    async fn list_due(
        &self,
        tenant_id: TenantId,
        window: DueWindow,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Every notification for the tenant regardless of state, newest first.
    async fn list_all(
        &self,
        tenant_id: TenantId,
        pagination: Pagination,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Mark a notification read. Returns `false` when the id is unknown.
    async fn mark_read(&self, id: NotificationId) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> InventoryReader for Arc<S>
where
    S: InventoryReader + ?Sized,
{
    async fn low_stock_items(
        &self,
        tenant_id: TenantId,
        threshold: i64,
    ) -> Result<Vec<StockLevel>, StoreError> {
        (**self).low_stock_items(tenant_id, threshold).await
    }
}

#[async_trait]
impl<S> NotificationStore for Arc<S>
where
    S: NotificationStore + ?Sized,
{
    async fn insert_if_absent(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, StoreError> {
        (**self).insert_if_absent(notification).await
    }

    async fn insert(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        (**self).insert(notification).await
    }

    async fn list_due(
        &self,
        tenant_id: TenantId,
        window: DueWindow,
    ) -> Result<Vec<Notification>, StoreError> {
        (**self).list_due(tenant_id, window).await
    }

    async fn list_all(
        &self,
        tenant_id: TenantId,
        pagination: Pagination,
    ) -> Result<Vec<Notification>, StoreError> {
        (**self).list_all(tenant_id, pagination).await
    }

    async fn mark_read(&self, id: NotificationId) -> Result<bool, StoreError> {
        (**self).mark_read(id).await
    }
}
