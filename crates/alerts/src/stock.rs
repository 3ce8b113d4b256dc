use serde::{Deserialize, Serialize};

use storekeeper_core::ItemId;

/// Units at or below which an item counts as under-stocked (inclusive).
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Current stock level of one inventory item.
///
/// Inventory rows are owned by the external inventory management flows; this
/// service only ever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub item_id: ItemId,
    pub name: String,
    pub quantity: i64,
}

impl StockLevel {
    /// Whether this level is at or below the low-stock threshold.
    pub fn is_low(&self) -> bool {
        self.quantity <= LOW_STOCK_THRESHOLD
    }
}
