//! Postgres-backed catalog and purchase store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (foreign key violation) | `23503` | `ForeignKey` |
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (check / not-null violation) | `23514`, `23502` | `Constraint` |
//! | Database (other) | Any other | `Backend` |
//! | PoolTimedOut, PoolClosed, Io, Tls | N/A | `Connection` |
//! | Other | N/A | `Backend` |
//!
//! A unit of work wraps one `sqlx::Transaction`. Dropping it without commit
//! rolls the transaction back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;

use stockroom_core::{MovementId, ProductId, PurchaseId, PurchaseItemId, UserId, WarehouseId};
use stockroom_purchasing::{
    InventoryMovement, MovementFilter, MovementType, NewInventoryMovement, NewProduct,
    NewPurchaseItem, NewWarehouse, Product, Purchase, PurchaseItem, Warehouse,
};

use super::r#trait::{
    CatalogStore, ExistenceChecker, MovementReader, MovementRecorder, PurchaseReader, PurchaseWriter,
    StockMutator, StoreError, UnitOfWork, UnitOfWorkFactory,
};
use crate::config::DatabaseConfig;

/// Postgres store. Cheap to clone; shares one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool for the configured database.
    #[instrument(skip(config), fields(max_connections = config.max_connections), err)]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn items_for(&self, purchase_ids: &[i64]) -> Result<Vec<PurchaseItem>, StoreError> {
        let rows: Vec<PurchaseItemRow> = sqlx::query_as(
            r#"
            SELECT id, purchase_id, product_id, quantity, unit_price
            FROM purchase_items
            WHERE purchase_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(purchase_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_purchase_items", e))?;

        Ok(rows.into_iter().map(PurchaseItem::from).collect())
    }
}

#[async_trait]
impl ExistenceChecker for PostgresStore {
    #[instrument(skip(self), fields(warehouse_id = %id), err)]
    async fn warehouse_exists(&self, id: WarehouseId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1)")
            .bind(id.get())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("warehouse_exists", e))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product_exists(&self, id: ProductId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id.get())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("product_exists", e))
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self, warehouse), fields(name = %warehouse.name), err)]
    async fn create_warehouse(&self, warehouse: NewWarehouse) -> Result<Warehouse, StoreError> {
        let row: WarehouseRow = sqlx::query_as(
            r#"
            INSERT INTO warehouses (name, location, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, location, description, created_at, updated_at
            "#,
        )
        .bind(&warehouse.name)
        .bind(&warehouse.location)
        .bind(&warehouse.description)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_warehouse", e))?;

        Ok(Warehouse::from(row))
    }

    #[instrument(skip(self, product), fields(sku = %product.sku), err)]
    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let row: ProductRow = sqlx::query_as(
            r#"
            INSERT INTO products (name, sku, price, description, stock, reorder_level)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, sku, price, description, stock, reorder_level
            "#,
        )
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price)
        .bind(&product.description)
        .bind(product.stock)
        .bind(product.reorder_level)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;

        Ok(Product::from(row))
    }

    #[instrument(skip(self), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, sku, price, description, stock, reorder_level
            FROM products
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn list_low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, sku, price, description, stock, reorder_level
            FROM products
            WHERE stock <= reorder_level
            ORDER BY stock ASC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_low_stock_products", e))?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

#[async_trait]
impl UnitOfWorkFactory for PostgresStore {
    type Unit = PostgresUnitOfWork;

    async fn begin(&self) -> Result<PostgresUnitOfWork, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PostgresUnitOfWork { tx })
    }
}

#[async_trait]
impl PurchaseReader for PostgresStore {
    #[instrument(skip(self), fields(purchase_id = %id), err)]
    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>, StoreError> {
        let row: Option<PurchaseRow> = sqlx::query_as(
            r#"
            SELECT id, warehouse_id, created_by, created_at, updated_at
            FROM purchases
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_purchase", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut purchase = Purchase::from(row);
        purchase.items = self.items_for(&[id.get()]).await?;
        Ok(Some(purchase))
    }

    #[instrument(skip(self), err)]
    async fn list_purchases(&self) -> Result<Vec<Purchase>, StoreError> {
        let rows: Vec<PurchaseRow> = sqlx::query_as(
            r#"
            SELECT id, warehouse_id, created_by, created_at, updated_at
            FROM purchases
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_purchases", e))?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut by_purchase: HashMap<PurchaseId, Vec<PurchaseItem>> = HashMap::new();
        for item in self.items_for(&ids).await? {
            by_purchase.entry(item.purchase_id).or_default().push(item);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut purchase = Purchase::from(row);
                purchase.items = by_purchase.remove(&purchase.id).unwrap_or_default();
                purchase
            })
            .collect())
    }
}

#[async_trait]
impl MovementReader for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list_movements(&self, filter: MovementFilter) -> Result<Vec<InventoryMovement>, StoreError> {
        let rows: Vec<MovementRow> = sqlx::query_as(
            r#"
            SELECT id, product_id, warehouse_id, movement_type, quantity,
                   reference_type, reference_id, created_by, notes, created_at
            FROM inventory_movements
            WHERE ($1::BIGINT IS NULL OR product_id = $1)
              AND ($2::BIGINT IS NULL OR warehouse_id = $2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(filter.product_id.map(|p| p.get()))
        .bind(filter.warehouse_id.map(|w| w.get()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.into_iter().map(InventoryMovement::try_from).collect()
    }
}

/// Unit of work over one Postgres transaction.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PostgresUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresUnitOfWork").finish_non_exhaustive()
    }
}

#[async_trait]
impl PurchaseWriter for PostgresUnitOfWork {
    #[instrument(skip(self), fields(warehouse_id = %warehouse_id), err)]
    async fn create_purchase(
        &mut self,
        warehouse_id: WarehouseId,
        created_by: UserId,
    ) -> Result<Purchase, StoreError> {
        let row: PurchaseRow = sqlx::query_as(
            r#"
            INSERT INTO purchases (warehouse_id, created_by)
            VALUES ($1, $2)
            RETURNING id, warehouse_id, created_by, created_at, updated_at
            "#,
        )
        .bind(warehouse_id.get())
        .bind(created_by.get())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("create_purchase", e))?;

        Ok(Purchase::from(row))
    }

    #[instrument(skip(self, item), fields(purchase_id = %purchase_id, product_id = %item.product_id), err)]
    async fn create_purchase_item(
        &mut self,
        purchase_id: PurchaseId,
        item: &NewPurchaseItem,
    ) -> Result<PurchaseItem, StoreError> {
        let row: PurchaseItemRow = sqlx::query_as(
            r#"
            INSERT INTO purchase_items (purchase_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, purchase_id, product_id, quantity, unit_price
            "#,
        )
        .bind(purchase_id.get())
        .bind(item.product_id.get())
        .bind(item.quantity)
        .bind(item.unit_price)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("create_purchase_item", e))?;

        Ok(PurchaseItem::from(row))
    }
}

#[async_trait]
impl StockMutator for PostgresUnitOfWork {
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn increment_stock(&mut self, product_id: ProductId, delta: i64) -> Result<(), StoreError> {
        if delta <= 0 {
            return Err(StoreError::InvalidWrite(format!(
                "stock increment must be positive, got {delta}"
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(delta)
        .bind(product_id.get())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("increment_stock", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ForeignKey(format!("product {product_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl MovementRecorder for PostgresUnitOfWork {
    #[instrument(
        skip(self, movement),
        fields(product_id = %movement.product_id, movement_type = %movement.movement_type),
        err
    )]
    async fn record_movement(
        &mut self,
        movement: NewInventoryMovement,
    ) -> Result<InventoryMovement, StoreError> {
        let row: MovementRow = sqlx::query_as(
            r#"
            INSERT INTO inventory_movements
                (product_id, warehouse_id, movement_type, quantity,
                 reference_type, reference_id, created_by, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, product_id, warehouse_id, movement_type, quantity,
                      reference_type, reference_id, created_by, notes, created_at
            "#,
        )
        .bind(movement.product_id.get())
        .bind(movement.warehouse_id.get())
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.reference_type.as_deref())
        .bind(movement.reference_id)
        .bind(movement.created_by.get())
        .bind(movement.notes.as_deref())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("record_movement", e))?;

        InventoryMovement::try_from(row)
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(|e| match map_sqlx_error("commit", e) {
            StoreError::Backend(msg) => StoreError::Commit(msg),
            other => other,
        })
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23503") => StoreError::ForeignKey(msg),
                Some("23505") => StoreError::Duplicate(msg),
                Some("23514") | Some("23502") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Connection(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Connection(format!("i/o error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Connection(format!("tls error in {operation}: {e}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

// SQLx row types

#[derive(Debug, FromRow)]
struct WarehouseRow {
    id: i64,
    name: String,
    location: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: WarehouseId::new(row.id),
            name: row.name,
            location: row.location,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    sku: String,
    price: f64,
    description: String,
    stock: i64,
    reorder_level: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::new(row.id),
            name: row.name,
            sku: row.sku,
            price: row.price,
            description: row.description,
            stock: row.stock,
            reorder_level: row.reorder_level,
        }
    }
}

#[derive(Debug, FromRow)]
struct PurchaseRow {
    id: i64,
    warehouse_id: i64,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Purchase {
            id: PurchaseId::new(row.id),
            warehouse_id: WarehouseId::new(row.warehouse_id),
            created_by: UserId::new(row.created_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, FromRow)]
struct PurchaseItemRow {
    id: i64,
    purchase_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: Option<f64>,
}

impl From<PurchaseItemRow> for PurchaseItem {
    fn from(row: PurchaseItemRow) -> Self {
        PurchaseItem {
            id: PurchaseItemId::new(row.id),
            purchase_id: PurchaseId::new(row.purchase_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: i64,
    product_id: i64,
    warehouse_id: i64,
    movement_type: String,
    quantity: i64,
    reference_type: Option<String>,
    reference_id: Option<i64>,
    created_by: i64,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for InventoryMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type: MovementType = row
            .movement_type
            .parse()
            .map_err(|e| StoreError::Backend(format!("corrupt movement row {}: {e}", row.id)))?;

        Ok(InventoryMovement {
            id: MovementId::new(row.id),
            product_id: ProductId::new(row.product_id),
            warehouse_id: WarehouseId::new(row.warehouse_id),
            movement_type,
            quantity: row.quantity,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            created_by: UserId::new(row.created_by),
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}
