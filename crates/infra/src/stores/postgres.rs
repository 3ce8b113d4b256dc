//! Postgres-backed stores.
//!
//! Both stores run parameterized queries over a shared `sqlx` connection
//! pool. Every statement is tenant-scoped in its WHERE clause except
//! `mark_read`, which is keyed by the globally unique primary id. The
//! reconcile insert relies on the `UNIQUE (tenant_id, item_id, category)`
//! constraint (see `db/schema.sql`): the existence check and the write are
//! one statement, so concurrent reconciles cannot double-insert.
//!
//! SQLx failures of any kind map to `StoreError::Unavailable`. The caller
//! treats them as transient; the write path is idempotent, so retries are
//! safe.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use storekeeper_alerts::{
    DueWindow, NewNotification, Notification, NotificationCategory, StockLevel,
};
use storekeeper_core::{ItemId, NotificationId, TenantId};

use super::{InventoryReader, NotificationStore, Pagination, StoreError};

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(format!("{operation}: {err}"))
}

/// Read-only scan over the `products` table.
#[derive(Debug, Clone)]
pub struct PostgresInventory {
    pool: Arc<PgPool>,
}

impl PostgresInventory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl InventoryReader for PostgresInventory {
    #[instrument(skip(self), fields(tenant_id = %tenant_id.as_uuid()), err)]
    async fn low_stock_items(
        &self,
        tenant_id: TenantId,
        threshold: i64,
    ) -> Result<Vec<StockLevel>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                item_id,
                name,
                stock_quantity
            FROM products
            WHERE tenant_id = $1 AND stock_quantity <= $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(threshold)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("low_stock_items", e))?;

        let mut levels = Vec::with_capacity(rows.len());
        for row in rows {
            let item_id: uuid::Uuid = row
                .try_get("item_id")
                .map_err(|e| map_sqlx_error("low_stock_items", e))?;
            let name: String = row
                .try_get("name")
                .map_err(|e| map_sqlx_error("low_stock_items", e))?;
            let quantity: i64 = row
                .try_get("stock_quantity")
                .map_err(|e| map_sqlx_error("low_stock_items", e))?;
            levels.push(StockLevel {
                item_id: ItemId::from_uuid(item_id),
                name,
                quantity,
            });
        }
        Ok(levels)
    }
}

/// Notification rows in the `notifications` table.
#[derive(Debug, Clone)]
pub struct PostgresNotificationStore {
    pool: Arc<PgPool>,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

struct NotificationRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    item_id: Option<uuid::Uuid>,
    category: String,
    title: String,
    message: String,
    due_date: Option<NaiveDate>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for NotificationRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(NotificationRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            item_id: row.try_get("item_id")?,
            category: row.try_get("category")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            due_date: row.try_get("due_date")?,
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification, StoreError> {
        let category: NotificationCategory = self.category.parse().map_err(|_| {
            StoreError::Unavailable(format!(
                "notification {} has unknown category {:?}",
                self.id, self.category
            ))
        })?;
        Ok(Notification {
            id: NotificationId::from_uuid(self.id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            item_id: self.item_id.map(ItemId::from_uuid),
            category,
            title: self.title,
            message: self.message,
            due_date: self.due_date,
            is_read: self.is_read,
            created_at: self.created_at,
        })
    }
}

fn rows_into_notifications(
    operation: &str,
    rows: Vec<sqlx::postgres::PgRow>,
) -> Result<Vec<Notification>, StoreError> {
    let mut notifications = Vec::with_capacity(rows.len());
    for row in rows {
        let parsed = NotificationRow::from_row(&row).map_err(|e| map_sqlx_error(operation, e))?;
        notifications.push(parsed.into_notification()?);
    }
    Ok(notifications)
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    #[instrument(
        skip(self, notification),
        fields(tenant_id = %notification.tenant_id.as_uuid()),
        err
    )]
    async fn insert_if_absent(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, StoreError> {
        let id = NotificationId::new();
        let row = sqlx::query(
            r#"
            INSERT INTO notifications (id, tenant_id, item_id, category, title, message, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tenant_id, item_id, category) DO NOTHING
            RETURNING
                id,
                tenant_id,
                item_id,
                category,
                title,
                message,
                due_date,
                is_read,
                created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(notification.tenant_id.as_uuid())
        .bind(notification.item_id.map(|item| *item.as_uuid()))
        .bind(notification.category.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.due_date)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_if_absent", e))?;

        match row {
            Some(row) => {
                let parsed = NotificationRow::from_row(&row)
                    .map_err(|e| map_sqlx_error("insert_if_absent", e))?;
                Ok(Some(parsed.into_notification()?))
            }
            None => Ok(None),
        }
    }

    #[instrument(
        skip(self, notification),
        fields(tenant_id = %notification.tenant_id.as_uuid()),
        err
    )]
    async fn insert(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let id = NotificationId::new();
        let row = sqlx::query(
            r#"
            INSERT INTO notifications (id, tenant_id, item_id, category, title, message, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING
                id,
                tenant_id,
                item_id,
                category,
                title,
                message,
                due_date,
                is_read,
                created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(notification.tenant_id.as_uuid())
        .bind(notification.item_id.map(|item| *item.as_uuid()))
        .bind(notification.category.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.due_date)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        let parsed = NotificationRow::from_row(&row).map_err(|e| map_sqlx_error("insert", e))?;
        parsed.into_notification()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id.as_uuid()), err)]
    async fn list_due(
        &self,
        tenant_id: TenantId,
        window: DueWindow,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                tenant_id,
                item_id,
                category,
                title,
                message,
                due_date,
                is_read,
                created_at
            FROM notifications
            WHERE tenant_id = $1
              AND is_read = FALSE
              AND due_date BETWEEN $2 AND $3
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(window.from)
        .bind(window.to)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_due", e))?;

        rows_into_notifications("list_due", rows)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id.as_uuid()), err)]
    async fn list_all(
        &self,
        tenant_id: TenantId,
        pagination: Pagination,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                tenant_id,
                item_id,
                category,
                title,
                message,
                due_date,
                is_read,
                created_at
            FROM notifications
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_all", e))?;

        rows_into_notifications("list_all", rows)
    }

    #[instrument(skip(self), fields(notification_id = %id.as_uuid()), err)]
    async fn mark_read(&self, id: NotificationId) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_read", e))?;

        Ok(result.rows_affected() == 1)
    }
}
