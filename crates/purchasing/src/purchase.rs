use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ProductId, PurchaseId, PurchaseItemId, UserId, WarehouseId};

/// One requested line of a purchase, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchaseItem {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

impl NewPurchaseItem {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: None,
        }
    }

    pub fn priced(product_id: ProductId, quantity: i64, unit_price: f64) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: Some(unit_price),
        }
    }
}

/// Command: record a stock receipt into a warehouse.
///
/// The caller identity is not part of the command; it comes from the
/// authenticated request context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePurchase {
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub items: Vec<NewPurchaseItem>,
}

impl CreatePurchase {
    pub fn new(warehouse_id: WarehouseId, items: Vec<NewPurchaseItem>) -> Self {
        Self { warehouse_id, items }
    }

    /// Distinct product ids in order of first appearance.
    pub fn distinct_product_ids(&self) -> Vec<ProductId> {
        let mut seen = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !seen.contains(&item.product_id) {
                seen.push(item.product_id);
            }
        }
        seen
    }
}

/// A persisted purchase line item. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub id: PurchaseItemId,
    pub purchase_id: PurchaseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Option<f64>,
}

impl Entity for PurchaseItem {
    type Id = PurchaseItemId;

    fn id(&self) -> PurchaseItemId {
        self.id
    }
}

/// A persisted purchase header with its items in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub warehouse_id: WarehouseId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<PurchaseItem>,
}

impl Purchase {
    /// Attach a persisted item to this purchase.
    ///
    /// Rejects items that belong to a different purchase header.
    pub fn attach_item(&mut self, item: PurchaseItem) -> DomainResult<()> {
        if item.purchase_id != self.id {
            return Err(DomainError::invariant(format!(
                "item {} belongs to purchase {}, not {}",
                item.id, item.purchase_id, self.id
            )));
        }
        self.items.push(item);
        Ok(())
    }

    /// Sum of quantities received for `product_id` in this purchase.
    pub fn quantity_for(&self, product_id: ProductId) -> i64 {
        self.items
            .iter()
            .filter(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .sum()
    }
}

impl Entity for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> PurchaseId {
        self.id
    }
}
