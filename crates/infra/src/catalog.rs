//! Catalog registration: the warehouses and products purchases refer to.
//!
//! Commands are validated before storage is touched. Each write is a single
//! row, so no unit of work is involved.

use thiserror::Error;
use tracing::instrument;

use stockroom_core::DomainError;
use stockroom_purchasing::{NewProduct, NewWarehouse, Product, Warehouse};

use crate::store::{CatalogStore, StoreError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("product with this sku already exists")]
    DuplicateSku(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl From<DomainError> for CatalogError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => CatalogError::Validation(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Catalog<S> {
    store: S,
}

impl<S: CatalogStore> Catalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, warehouse), fields(name = %warehouse.name), err(Display))]
    pub async fn create_warehouse(&self, warehouse: NewWarehouse) -> Result<Warehouse, CatalogError> {
        warehouse.validate()?;
        let created = self.store.create_warehouse(warehouse).await?;
        tracing::info!(warehouse_id = %created.id, "warehouse created");
        Ok(created)
    }

    #[instrument(skip(self, product), fields(sku = %product.sku), err(Display))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        product.validate()?;
        let sku = product.sku.clone();
        let created = match self.store.create_product(product).await {
            Ok(p) => p,
            Err(StoreError::Duplicate(_)) => return Err(CatalogError::DuplicateSku(sku)),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(product_id = %created.id, "product created");
        Ok(created)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.store.list_products().await
    }

    pub async fn low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        self.store.list_low_stock_products().await
    }
}
