//! Inventory movement ledger model (append-only audit trail).

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, Entity, MovementId, ProductId, PurchaseId, UserId, WarehouseId};

/// Reference type recorded on movements caused by a purchase.
pub const PURCHASE_REFERENCE: &str = "purchase";

/// Kind of stock change a movement records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Purchase,
    Sale,
    Adjustment,
    Transfer,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::Sale => "sale",
            MovementType::Adjustment => "adjustment",
            MovementType::Transfer => "transfer",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(MovementType::Purchase),
            "sale" => Ok(MovementType::Sale),
            "adjustment" => Ok(MovementType::Adjustment),
            "transfer" => Ok(MovementType::Transfer),
            other => Err(DomainError::validation(format!("unknown movement type '{other}'"))),
        }
    }
}

/// A ledger entry ready to be appended (identity and timestamp not yet assigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventoryMovement {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    pub created_by: UserId,
    pub notes: Option<String>,
}

impl NewInventoryMovement {
    /// Ledger entry for one received purchase line.
    pub fn purchase(
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
        purchase_id: PurchaseId,
        created_by: UserId,
    ) -> Self {
        Self {
            product_id,
            warehouse_id,
            movement_type: MovementType::Purchase,
            quantity,
            reference_type: Some(PURCHASE_REFERENCE.to_string()),
            reference_id: Some(purchase_id.get()),
            created_by,
            notes: None,
        }
    }

    /// Stamp the storage-assigned identity and timestamp.
    pub fn into_recorded(self, id: MovementId, created_at: DateTime<Utc>) -> InventoryMovement {
        InventoryMovement {
            id,
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            movement_type: self.movement_type,
            quantity: self.quantity,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
            created_by: self.created_by,
            notes: self.notes,
            created_at,
        }
    }
}

/// A recorded ledger entry. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub movement_type: MovementType,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<i64>,
    pub created_by: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InventoryMovement {
    /// Whether this entry was caused by the given purchase.
    pub fn references_purchase(&self, purchase_id: PurchaseId) -> bool {
        self.reference_type.as_deref() == Some(PURCHASE_REFERENCE)
            && self.reference_id == Some(purchase_id.get())
    }
}

impl Entity for InventoryMovement {
    type Id = MovementId;

    fn id(&self) -> MovementId {
        self.id
    }
}

/// Read-side filter for the ledger. Empty filter matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
}

impl MovementFilter {
    pub fn for_product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            warehouse_id: None,
        }
    }

    pub fn for_warehouse(warehouse_id: WarehouseId) -> Self {
        Self {
            product_id: None,
            warehouse_id: Some(warehouse_id),
        }
    }

    pub fn matches(&self, movement: &InventoryMovement) -> bool {
        self.product_id.is_none_or(|p| p == movement.product_id)
            && self.warehouse_id.is_none_or(|w| w == movement.warehouse_id)
    }
}
