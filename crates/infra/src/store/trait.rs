use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::{ProductId, PurchaseId, UserId, WarehouseId};
use stockroom_purchasing::{
    InventoryMovement, MovementFilter, NewInventoryMovement, NewProduct, NewPurchaseItem,
    NewWarehouse, Product, Purchase, PurchaseItem, Warehouse,
};

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to validation or not-found
/// outcomes, which the purchase workflow detects before touching storage.
/// Messages may carry backend detail; they are logged, never shown to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced warehouse/product/purchase does not exist (foreign key).
    #[error("referenced row does not exist: {0}")]
    ForeignKey(String),

    /// A uniqueness constraint rejected the write.
    #[error("duplicate value: {0}")]
    Duplicate(String),

    /// A check or not-null constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The caller asked for a write the storage contract forbids.
    #[error("invalid write: {0}")]
    InvalidWrite(String),

    /// The backend could not be reached (pool closed, I/O, timeouts acquiring a connection).
    #[error("storage unavailable: {0}")]
    Connection(String),

    /// The unit of work failed to commit; nothing was applied.
    #[error("commit failed: {0}")]
    Commit(String),

    /// The unit of work stayed open longer than allowed and was rolled back.
    #[error("unit of work timed out after {0:?}")]
    Timeout(Duration),

    /// Any other backend failure.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Read-only existence lookups against committed state.
#[async_trait]
pub trait ExistenceChecker: Send + Sync {
    async fn warehouse_exists(&self, id: WarehouseId) -> Result<bool, StoreError>;
    async fn product_exists(&self, id: ProductId) -> Result<bool, StoreError>;
}

/// Creates purchase headers and line items inside a unit of work.
#[async_trait]
pub trait PurchaseWriter: Send {
    /// Insert a purchase header. The returned purchase has no items yet.
    async fn create_purchase(
        &mut self,
        warehouse_id: WarehouseId,
        created_by: UserId,
    ) -> Result<Purchase, StoreError>;

    async fn create_purchase_item(
        &mut self,
        purchase_id: PurchaseId,
        item: &NewPurchaseItem,
    ) -> Result<PurchaseItem, StoreError>;
}

/// Applies stock changes inside a unit of work.
#[async_trait]
pub trait StockMutator: Send {
    /// Atomically add `delta` (> 0) to the product's stock.
    ///
    /// Implementations must express this as a single `stock = stock + delta`
    /// operation executed by the storage engine, never as a read followed by
    /// a write.
    async fn increment_stock(&mut self, product_id: ProductId, delta: i64) -> Result<(), StoreError>;
}

/// Appends ledger rows inside a unit of work.
#[async_trait]
pub trait MovementRecorder: Send {
    async fn record_movement(
        &mut self,
        movement: NewInventoryMovement,
    ) -> Result<InventoryMovement, StoreError>;
}

/// One all-or-nothing unit of work.
///
/// `commit` and `rollback` consume the unit, so a finished unit cannot be
/// reused. Dropping an open unit rolls it back.
#[async_trait]
pub trait UnitOfWork: PurchaseWriter + StockMutator + MovementRecorder + Send + Sized {
    async fn commit(self) -> Result<(), StoreError>;
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Opens units of work.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    type Unit: UnitOfWork + 'static;

    async fn begin(&self) -> Result<Self::Unit, StoreError>;
}

/// Read paths over committed purchases.
#[async_trait]
pub trait PurchaseReader: Send + Sync {
    /// Single purchase with its items, or `None`.
    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>, StoreError>;

    /// All purchases with items, newest first.
    async fn list_purchases(&self) -> Result<Vec<Purchase>, StoreError>;
}

/// Read path over the movement ledger.
#[async_trait]
pub trait MovementReader: Send + Sync {
    /// Matching movements, newest first.
    async fn list_movements(&self, filter: MovementFilter) -> Result<Vec<InventoryMovement>, StoreError>;
}

/// Catalog writes and reads outside any purchase unit of work.
///
/// Each call is a single-row statement against committed state.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_warehouse(&self, warehouse: NewWarehouse) -> Result<Warehouse, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the SKU is taken.
    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    /// All products, by id.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Products with `stock <= reorder_level`, lowest stock first.
    async fn list_low_stock_products(&self) -> Result<Vec<Product>, StoreError>;
}

#[async_trait]
impl<S> ExistenceChecker for Arc<S>
where
    S: ExistenceChecker + ?Sized,
{
    async fn warehouse_exists(&self, id: WarehouseId) -> Result<bool, StoreError> {
        (**self).warehouse_exists(id).await
    }

    async fn product_exists(&self, id: ProductId) -> Result<bool, StoreError> {
        (**self).product_exists(id).await
    }
}

#[async_trait]
impl<S> UnitOfWorkFactory for Arc<S>
where
    S: UnitOfWorkFactory,
{
    type Unit = S::Unit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        (**self).begin().await
    }
}

#[async_trait]
impl<S> PurchaseReader for Arc<S>
where
    S: PurchaseReader + ?Sized,
{
    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>, StoreError> {
        (**self).get_purchase(id).await
    }

    async fn list_purchases(&self) -> Result<Vec<Purchase>, StoreError> {
        (**self).list_purchases().await
    }
}

#[async_trait]
impl<S> MovementReader for Arc<S>
where
    S: MovementReader + ?Sized,
{
    async fn list_movements(&self, filter: MovementFilter) -> Result<Vec<InventoryMovement>, StoreError> {
        (**self).list_movements(filter).await
    }
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn create_warehouse(&self, warehouse: NewWarehouse) -> Result<Warehouse, StoreError> {
        (**self).create_warehouse(warehouse).await
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        (**self).create_product(product).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_products().await
    }

    async fn list_low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_low_stock_products().await
    }
}
