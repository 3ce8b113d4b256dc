use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use storekeeper_alerts::StockLevel;
use storekeeper_core::{ItemId, TenantId};
use storekeeper_infra::{InMemoryInventory, InMemoryNotificationStore, NotificationEngine};

fn bench_reconcile(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let inventory = Arc::new(InMemoryInventory::new());
    let notifications = Arc::new(InMemoryNotificationStore::new());
    let engine = NotificationEngine::new(inventory.clone(), notifications.clone());
    let tenant_id = TenantId::new();

    for i in 0i64..1_000 {
        inventory.upsert_level(
            tenant_id,
            StockLevel {
                item_id: ItemId::new(),
                name: format!("item-{i}"),
                quantity: i % 20,
            },
        );
    }

    // First pass raises the alerts; the measured steady state is the
    // dedup-and-fetch path every subsequent poll hits.
    rt.block_on(engine.reconcile_and_fetch(tenant_id)).unwrap();

    c.bench_function("reconcile_and_fetch_1k_items", |b| {
        b.iter(|| rt.block_on(engine.reconcile_and_fetch(tenant_id)).unwrap())
    });
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
