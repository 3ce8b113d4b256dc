use core::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storekeeper_core::{DomainError, ItemId, NotificationId, TenantId};

use crate::stock::StockLevel;

/// How many days past today a due date may lie and still be surfaced.
pub const DUE_WINDOW_DAYS: i64 = 2;

/// Notification taxonomy.
///
/// The low-stock flow only writes `Stock`; reminder flows (billing etc.)
/// share the same table and read path with their own categories.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationCategory {
    Stock,
    Billing,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Stock => "STOCK",
            NotificationCategory::Billing => "BILLING",
        }
    }
}

impl FromStr for NotificationCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STOCK" => Ok(NotificationCategory::Stock),
            "BILLING" => Ok(NotificationCategory::Billing),
            other => Err(DomainError::validation(format!(
                "unknown notification category: {other}"
            ))),
        }
    }
}

/// A notification persisted for a tenant.
///
/// At most one row may exist per (tenant_id, item_id, category); the dedup
/// check is on existence of *any* row, regardless of read state, and rows
/// are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub tenant_id: TenantId,
    pub item_id: Option<ItemId>,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub due_date: Option<NaiveDate>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification that has not been persisted yet.
///
/// The store assigns `id`, `created_at` and the initial unread state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub tenant_id: TenantId,
    pub item_id: Option<ItemId>,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub due_date: Option<NaiveDate>,
}

impl NewNotification {
    /// Build the low-stock alert for an under-threshold item.
    ///
    /// The due date is the reconcile date, so a fresh alert falls inside the
    /// surfacing window immediately. Dedup against existing rows is the
    /// store's concern.
    pub fn low_stock(tenant_id: TenantId, level: &StockLevel, today: NaiveDate) -> Self {
        Self {
            tenant_id,
            item_id: Some(level.item_id),
            category: NotificationCategory::Stock,
            title: "Low Stock Alert".to_string(),
            message: format!(
                "{} is running low: {} units remaining",
                level.name, level.quantity
            ),
            due_date: Some(today),
        }
    }

    /// Build a scheduled reminder.
    ///
    /// Reminders bypass the dedup key, so the `Stock` category is rejected
    /// here; stock alerts must go through the reconcile path.
    pub fn reminder(
        tenant_id: TenantId,
        item_id: Option<ItemId>,
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
        due_date: NaiveDate,
    ) -> Result<Self, DomainError> {
        if category == NotificationCategory::Stock {
            return Err(DomainError::validation(
                "stock alerts are raised by reconciliation, not scheduled",
            ));
        }
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        let message = message.into();
        if message.trim().is_empty() {
            return Err(DomainError::validation("message cannot be empty"));
        }
        Ok(Self {
            tenant_id,
            item_id,
            category,
            title,
            message,
            due_date: Some(due_date),
        })
    }
}

/// Inclusive date window in which a due date is considered current.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DueWindow {
    /// The window starting at `today` and extending `DUE_WINDOW_DAYS` ahead.
    pub fn starting(today: NaiveDate) -> Self {
        Self {
            from: today,
            to: today + Duration::days(DUE_WINDOW_DAYS),
        }
    }

    /// Whether a (possibly absent) due date falls inside the window.
    ///
    /// A missing due date is always outside: such notifications exist but
    /// are never surfaced by the pending-alerts read.
    pub fn contains(&self, due_date: Option<NaiveDate>) -> bool {
        match due_date {
            Some(date) => self.from <= date && date <= self.to,
            None => false,
        }
    }
}
