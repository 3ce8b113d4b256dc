//! Integration tests for the reconcile/dismiss flow over in-memory stores.
//!
//! Verifies:
//! - Reconciliation is idempotent and race-free (one row per item)
//! - The low-stock threshold is inclusive
//! - The due-window read surfaces exactly [today, today + 2 days]
//! - Dismissal is terminal and tenant isolation holds

use std::sync::Arc;

use chrono::{Duration, Utc};

use storekeeper_alerts::{
    NewNotification, NotificationCategory, StockLevel, LOW_STOCK_THRESHOLD,
};
use storekeeper_core::{ItemId, NotificationId, TenantId};

use crate::engine::{EngineError, NotificationEngine};
use crate::stores::in_memory::{InMemoryInventory, InMemoryNotificationStore};
use crate::stores::{NotificationStore, Pagination};

type InMemoryEngine =
    NotificationEngine<Arc<InMemoryInventory>, Arc<InMemoryNotificationStore>>;

fn setup() -> (
    Arc<InMemoryInventory>,
    Arc<InMemoryNotificationStore>,
    InMemoryEngine,
) {
    let inventory = Arc::new(InMemoryInventory::new());
    let notifications = Arc::new(InMemoryNotificationStore::new());
    let engine = NotificationEngine::new(inventory.clone(), notifications.clone());
    (inventory, notifications, engine)
}

fn level(name: &str, quantity: i64) -> StockLevel {
    StockLevel {
        item_id: ItemId::new(),
        name: name.to_string(),
        quantity,
    }
}

#[tokio::test]
async fn reconcile_creates_one_alert_per_under_threshold_item() {
    let (inventory, notifications, engine) = setup();
    let tenant_id = TenantId::new();

    inventory.upsert_level(tenant_id, level("Beans", 2));
    inventory.upsert_level(tenant_id, level("Cups", 7));
    inventory.upsert_level(tenant_id, level("Lids", 500));

    let pending = engine.reconcile_and_fetch(tenant_id).await.unwrap();
    assert_eq!(pending.len(), 2);

    let all = notifications
        .list_all(tenant_id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all
        .iter()
        .all(|n| n.category == NotificationCategory::Stock && !n.is_read));
}

#[tokio::test]
async fn reconcile_is_idempotent_across_repeated_polls() {
    let (inventory, notifications, engine) = setup();
    let tenant_id = TenantId::new();

    inventory.upsert_level(tenant_id, level("Beans", 2));

    for _ in 0..5 {
        engine.reconcile_and_fetch(tenant_id).await.unwrap();
    }

    let all = notifications
        .list_all(tenant_id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn reconcile_dedups_even_when_quantity_fluctuates_below_threshold() {
    let (inventory, notifications, engine) = setup();
    let tenant_id = TenantId::new();

    let beans = level("Beans", 8);
    let item_id = beans.item_id;
    inventory.upsert_level(tenant_id, beans);
    engine.reconcile_and_fetch(tenant_id).await.unwrap();

    // Still under threshold, different quantity: the original row stands.
    inventory.upsert_level(
        tenant_id,
        StockLevel {
            item_id,
            name: "Beans".to_string(),
            quantity: 3,
        },
    );
    engine.reconcile_and_fetch(tenant_id).await.unwrap();

    let all = notifications
        .list_all(tenant_id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].message.contains('8'));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reconciles_do_not_duplicate() {
    let (inventory, notifications, engine) = setup();
    let engine = Arc::new(engine);
    let tenant_id = TenantId::new();

    inventory.upsert_level(tenant_id, level("Beans", 5));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.reconcile_and_fetch(tenant_id).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let all = notifications
        .list_all(tenant_id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn threshold_is_inclusive_at_ten_units() {
    let (inventory, notifications, engine) = setup();
    let tenant_id = TenantId::new();

    inventory.upsert_level(tenant_id, level("At threshold", LOW_STOCK_THRESHOLD));
    inventory.upsert_level(tenant_id, level("Just above", LOW_STOCK_THRESHOLD + 1));

    engine.reconcile_and_fetch(tenant_id).await.unwrap();

    let all = notifications
        .list_all(tenant_id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].message.contains("At threshold"));
}

#[tokio::test]
async fn fetch_surfaces_only_the_due_window() {
    let (_, notifications, engine) = setup();
    let tenant_id = TenantId::new();
    let today = Utc::now().date_naive();

    let reminder = |title: &str, offset: i64| {
        NewNotification::reminder(
            tenant_id,
            None,
            NotificationCategory::Billing,
            title,
            "Pay invoice",
            today + Duration::days(offset),
        )
        .unwrap()
    };

    notifications.insert(reminder("due today", 0)).await.unwrap();
    notifications
        .insert(reminder("window edge", 2))
        .await
        .unwrap();
    notifications
        .insert(reminder("too far out", 3))
        .await
        .unwrap();
    notifications
        .insert(reminder("already past", -1))
        .await
        .unwrap();
    notifications
        .insert(NewNotification {
            tenant_id,
            item_id: None,
            category: NotificationCategory::Billing,
            title: "no due date".to_string(),
            message: "Pay invoice".to_string(),
            due_date: None,
        })
        .await
        .unwrap();

    let pending = engine.reconcile_and_fetch(tenant_id).await.unwrap();
    let titles: Vec<&str> = pending.iter().map(|n| n.title.as_str()).collect();

    assert_eq!(pending.len(), 2);
    assert!(titles.contains(&"due today"));
    assert!(titles.contains(&"window edge"));
}

#[tokio::test]
async fn dismissed_alert_is_not_surfaced_or_recreated() {
    let (inventory, notifications, engine) = setup();
    let tenant_id = TenantId::new();

    inventory.upsert_level(tenant_id, level("Beans", 2));

    let pending = engine.reconcile_and_fetch(tenant_id).await.unwrap();
    assert_eq!(pending.len(), 1);

    engine.dismiss(pending[0].id).await.unwrap();

    // The item is still under threshold; the dismissed row keeps the dedup
    // key occupied, so the next poll neither re-creates nor re-surfaces it.
    let pending = engine.reconcile_and_fetch(tenant_id).await.unwrap();
    assert!(pending.is_empty());

    let all = notifications
        .list_all(tenant_id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_read);
}

#[tokio::test]
async fn reconcile_is_scoped_to_the_requested_tenant() {
    let (inventory, notifications, engine) = setup();
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();

    inventory.upsert_level(tenant_a, level("Beans", 5));
    inventory.upsert_level(tenant_b, level("Beans", 5));

    let pending = engine.reconcile_and_fetch(tenant_a).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending.iter().all(|n| n.tenant_id == tenant_a));

    let other = notifications
        .list_all(tenant_b, Pagination::default())
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn dismiss_unknown_id_is_not_found_and_mutates_nothing() {
    let (inventory, notifications, engine) = setup();
    let tenant_id = TenantId::new();

    inventory.upsert_level(tenant_id, level("Beans", 2));
    engine.reconcile_and_fetch(tenant_id).await.unwrap();

    let err = engine.dismiss(NotificationId::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound));

    let all = notifications
        .list_all(tenant_id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(!all[0].is_read);
}

#[tokio::test]
async fn dismiss_is_idempotent_for_an_existing_row() {
    let (inventory, _, engine) = setup();
    let tenant_id = TenantId::new();

    inventory.upsert_level(tenant_id, level("Beans", 2));
    let pending = engine.reconcile_and_fetch(tenant_id).await.unwrap();

    engine.dismiss(pending[0].id).await.unwrap();
    engine.dismiss(pending[0].id).await.unwrap();
}

#[tokio::test]
async fn scheduled_reminder_shares_the_pending_read_path() {
    let (_, _, engine) = setup();
    let tenant_id = TenantId::new();
    let today = Utc::now().date_naive();

    let stored = engine
        .schedule_reminder(
            tenant_id,
            None,
            NotificationCategory::Billing,
            "Invoice due".to_string(),
            "Invoice #42 is due".to_string(),
            today + Duration::days(1),
        )
        .await
        .unwrap();
    assert!(!stored.is_read);

    let pending = engine.reconcile_and_fetch(tenant_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, stored.id);
}

#[tokio::test]
async fn list_all_paginates_newest_first() {
    let (_, notifications, engine) = setup();
    let tenant_id = TenantId::new();
    let today = Utc::now().date_naive();

    for i in 0..5 {
        notifications
            .insert(
                NewNotification::reminder(
                    tenant_id,
                    None,
                    NotificationCategory::Billing,
                    format!("reminder {i}"),
                    "Pay invoice",
                    today,
                )
                .unwrap(),
            )
            .await
            .unwrap();
    }

    let first_page = engine
        .list_all(tenant_id, Pagination::new(Some(2), None))
        .await
        .unwrap();
    assert_eq!(first_page.len(), 2);

    let second_page = engine
        .list_all(tenant_id, Pagination::new(Some(2), Some(2)))
        .await
        .unwrap();
    assert_eq!(second_page.len(), 2);
    assert!(first_page
        .iter()
        .all(|n| second_page.iter().all(|m| m.id != n.id)));
}
