//! Warehouses and products as seen by the purchasing core.
//!
//! Both are created once and referenced by purchases afterwards. The product
//! stock counter only moves through an atomic increment in the storage layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ProductId, WarehouseId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Warehouse {
    /// Convenience constructor for seeding stores.
    pub fn named(id: WarehouseId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            location: String::new(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Command: register a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
}

impl NewWarehouse {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("warehouse name is required"));
        }
        Ok(())
    }

    /// Stamp the storage-assigned identity and timestamps.
    pub fn into_warehouse(self, id: WarehouseId, now: DateTime<Utc>) -> Warehouse {
        Warehouse {
            id,
            name: self.name,
            location: self.location,
            description: self.description,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> WarehouseId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub description: String,
    /// Current on-hand quantity. Never negative.
    pub stock: i64,
    pub reorder_level: i64,
}

impl Product {
    /// Convenience constructor for seeding stores.
    pub fn with_stock(id: ProductId, sku: impl Into<String>, stock: i64) -> Self {
        let sku = sku.into();
        Self {
            id,
            name: sku.clone(),
            sku,
            price: 0.0,
            description: String::new(),
            stock,
            reorder_level: 0,
        }
    }
}

impl Product {
    /// At or below the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.reorder_level
    }
}

/// Command: register a product, optionally with opening stock.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub reorder_level: i64,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() || self.sku.trim().is_empty() {
            return Err(DomainError::validation("product name and sku are required"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(DomainError::validation("price must be a non-negative number"));
        }
        if self.stock < 0 {
            return Err(DomainError::validation("stock must not be negative"));
        }
        if self.reorder_level < 0 {
            return Err(DomainError::validation("reorder level must not be negative"));
        }
        Ok(())
    }

    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            sku: self.sku,
            price: self.price,
            description: self.description,
            stock: self.stock,
            reorder_level: self.reorder_level,
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}
