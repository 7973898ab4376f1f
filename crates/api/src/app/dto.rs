use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{ProductId, PurchaseId, PurchaseItemId, UserId, WarehouseId};
use stockroom_purchasing::{
    CreatePurchase, InventoryMovement, MovementFilter, NewPurchaseItem, Product, Purchase,
    PurchaseItem, Warehouse,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub items: Vec<PurchaseItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<f64>,
}

impl From<CreatePurchaseRequest> for CreatePurchase {
    fn from(body: CreatePurchaseRequest) -> Self {
        CreatePurchase::new(
            body.warehouse_id,
            body.items
                .into_iter()
                .map(|i| NewPurchaseItem {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseQuery {
    pub id: Option<PurchaseId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
}

impl From<MovementQuery> for MovementFilter {
    fn from(q: MovementQuery) -> Self {
        MovementFilter {
            product_id: q.product_id,
            warehouse_id: q.warehouse_id,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct PurchaseItemResponse {
    pub id: PurchaseItemId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Option<f64>,
}

impl From<PurchaseItem> for PurchaseItemResponse {
    fn from(item: PurchaseItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub id: PurchaseId,
    pub warehouse_id: WarehouseId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<PurchaseItemResponse>,
}

impl From<Purchase> for PurchaseResponse {
    fn from(p: Purchase) -> Self {
        Self {
            id: p.id,
            warehouse_id: p.warehouse_id,
            created_by: p.created_by,
            created_at: p.created_at,
            updated_at: p.updated_at,
            items: p.items.into_iter().map(PurchaseItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PurchaseCreatedResponse {
    pub message: &'static str,
    pub purchase: PurchaseResponse,
}

impl PurchaseCreatedResponse {
    pub fn new(purchase: Purchase) -> Self {
        Self {
            message: "purchase created successfully",
            purchase: purchase.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PurchaseEnvelope {
    pub purchase: PurchaseResponse,
}

#[derive(Debug, Serialize)]
pub struct PurchaseListResponse {
    pub purchases: Vec<PurchaseResponse>,
}

#[derive(Debug, Serialize)]
pub struct MovementListResponse {
    pub movements: Vec<InventoryMovement>,
}

#[derive(Debug, Serialize)]
pub struct WarehouseCreatedResponse {
    pub message: &'static str,
    pub warehouse: Warehouse,
}

#[derive(Debug, Serialize)]
pub struct ProductCreatedResponse {
    pub message: &'static str,
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
}
