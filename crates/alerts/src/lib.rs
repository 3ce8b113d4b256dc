//! Alerting domain module.
//!
//! This crate contains the business rules for low-stock alerting and
//! due-date-bearing notifications, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod notification;
pub mod stock;

pub use notification::{
    DueWindow, NewNotification, Notification, NotificationCategory, DUE_WINDOW_DAYS,
};
pub use stock::{StockLevel, LOW_STOCK_THRESHOLD};
