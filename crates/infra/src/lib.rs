//! Infrastructure layer: storage adapters and the notification engine.

pub mod engine;
pub mod stores;

#[cfg(test)]
mod integration_tests;

pub use engine::{AlertSink, EngineError, NoopAlertSink, NotificationEngine};
pub use stores::in_memory::{InMemoryInventory, InMemoryNotificationStore};
pub use stores::postgres::{PostgresInventory, PostgresNotificationStore};
pub use stores::{InventoryReader, NotificationStore, Pagination, StoreError};
