//! Low-stock reconciliation engine.
//!
//! One invocation per inbound poll: scan the tenant's inventory, raise a
//! deduplicated alert for every under-threshold item, then return the
//! pending (unread, due-window) notifications. The whole sequence is
//! idempotent, so a retried or concurrent invocation cannot create
//! duplicate rows; the store's dedup key is the arbiter.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::instrument;

use storekeeper_alerts::{
    DueWindow, NewNotification, Notification, NotificationCategory, LOW_STOCK_THRESHOLD,
};
use storekeeper_core::{DomainError, ItemId, NotificationId, TenantId};

use crate::stores::{InventoryReader, NotificationStore, Pagination, StoreError};

/// Engine operation error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound => EngineError::NotFound,
            DomainError::Validation(msg) => EngineError::Validation(msg),
            other => EngineError::Validation(other.to_string()),
        }
    }
}

/// Sink for alerts raised by a reconcile pass (realtime fan-out, logging).
///
/// Delivery is best-effort and must not block; a lost emission is corrected
/// by the next poll.
pub trait AlertSink: Send + Sync {
    fn raised(&self, tenant_id: TenantId, notification: &Notification);
}

/// Sink that drops everything.
#[derive(Debug, Default)]
pub struct NoopAlertSink;

impl AlertSink for NoopAlertSink {
    fn raised(&self, _tenant_id: TenantId, _notification: &Notification) {}
}

/// Notification engine over an inventory reader and a notification store.
pub struct NotificationEngine<I, N> {
    inventory: I,
    notifications: N,
    sink: Arc<dyn AlertSink>,
}

impl<I, N> NotificationEngine<I, N>
where
    I: InventoryReader,
    N: NotificationStore,
{
    pub fn new(inventory: I, notifications: N) -> Self {
        Self {
            inventory,
            notifications,
            sink: Arc::new(NoopAlertSink),
        }
    }

    /// Attach a sink that observes newly raised alerts.
    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Bring the notification table into agreement with current inventory,
    /// then return the tenant's pending alerts (unread, due within
    /// [today, today + 2 days], newest first).
    ///
    /// Once a row exists for an item, it stays the single record for that
    /// item until dismissed, and the dedup check ignores read state, so a
    /// dismissed item is not re-alerted either.
    #[instrument(skip(self), fields(tenant_id = %tenant_id.as_uuid()), err)]
    pub async fn reconcile_and_fetch(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<Notification>, EngineError> {
        let today = Utc::now().date_naive();
        let low = self
            .inventory
            .low_stock_items(tenant_id, LOW_STOCK_THRESHOLD)
            .await?;

        let mut raised = 0usize;
        for level in &low {
            let alert = NewNotification::low_stock(tenant_id, level, today);
            if let Some(created) = self.notifications.insert_if_absent(alert).await? {
                self.sink.raised(tenant_id, &created);
                raised += 1;
            }
        }
        if raised > 0 {
            tracing::info!(raised, scanned = low.len(), "raised low-stock alerts");
        }

        Ok(self
            .notifications
            .list_due(tenant_id, DueWindow::starting(today))
            .await?)
    }

    /// Mark one notification read.
    ///
    /// The row is kept: the dedup key stays occupied, which is what makes
    /// dismissal terminal for that (tenant, item, category).
    #[instrument(skip(self), fields(notification_id = %id.as_uuid()), err)]
    pub async fn dismiss(&self, id: NotificationId) -> Result<(), EngineError> {
        if self.notifications.mark_read(id).await? {
            Ok(())
        } else {
            Err(EngineError::NotFound)
        }
    }

    /// Insert a scheduled reminder. Non-stock categories share the table
    /// and the due-window read path with the low-stock flow.
    pub async fn schedule_reminder(
        &self,
        tenant_id: TenantId,
        item_id: Option<ItemId>,
        category: NotificationCategory,
        title: String,
        message: String,
        due_date: NaiveDate,
    ) -> Result<Notification, EngineError> {
        let reminder =
            NewNotification::reminder(tenant_id, item_id, category, title, message, due_date)?;
        Ok(self.notifications.insert(reminder).await?)
    }

    /// Admin listing: every notification for the tenant, newest first.
    pub async fn list_all(
        &self,
        tenant_id: TenantId,
        pagination: Pagination,
    ) -> Result<Vec<Notification>, EngineError> {
        Ok(self.notifications.list_all(tenant_id, pagination).await?)
    }
}
