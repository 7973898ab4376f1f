use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use stockroom_core::{Entity, MovementId, ProductId, PurchaseId, PurchaseItemId, UserId, WarehouseId};
use stockroom_purchasing::{
    InventoryMovement, MovementFilter, NewInventoryMovement, NewProduct, NewPurchaseItem,
    NewWarehouse, Product, Purchase, PurchaseItem, Warehouse,
};

use super::r#trait::{
    CatalogStore, ExistenceChecker, MovementReader, MovementRecorder, PurchaseReader, PurchaseWriter,
    StockMutator, StoreError, UnitOfWork, UnitOfWorkFactory,
};

#[derive(Debug, Default)]
struct Tables {
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    products: BTreeMap<ProductId, Product>,
    purchases: BTreeMap<PurchaseId, Purchase>,
    movements: Vec<InventoryMovement>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    purchase_seq: AtomicI64,
    item_seq: AtomicI64,
    movement_seq: AtomicI64,
    fail_next_commit: AtomicBool,
}

impl Shared {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

/// One past the largest key, so seeded rows with explicit ids never collide.
fn next_key<K: Copy + Into<i64>, V>(table: &BTreeMap<K, V>) -> i64 {
    table.keys().next_back().map_or(1, |k| (*k).into() + 1)
}

/// In-memory relational store.
///
/// Intended for tests/dev. Units of work stage their writes privately and
/// apply them under a single write lock at commit, which gives the same
/// all-or-nothing visibility as a database transaction. Identifiers come from
/// sequences that are not rolled back, so ids may have gaps.
///
/// Referenced ids are checked when a write is staged and again at commit,
/// mirroring foreign-key constraints.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        let mut tables = self.shared.write()?;
        tables.warehouses.insert(warehouse.id(), warehouse);
        Ok(())
    }

    pub fn insert_product(&self, product: Product) -> Result<(), StoreError> {
        if product.stock < 0 {
            return Err(StoreError::Constraint(format!(
                "product {} stock must not be negative",
                product.id
            )));
        }
        let mut tables = self.shared.write()?;
        tables.products.insert(product.id(), product);
        Ok(())
    }

    /// Delete a product without checking references.
    ///
    /// Used to simulate a concurrent delete between existence check and write.
    pub fn remove_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let mut tables = self.shared.write()?;
        Ok(tables.products.remove(&id))
    }

    pub fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.shared.read()?.products.get(&id).cloned())
    }

    /// Make the next commit fail before anything is applied.
    pub fn fail_next_commit(&self) {
        self.shared.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn purchase_count(&self) -> Result<usize, StoreError> {
        Ok(self.shared.read()?.purchases.len())
    }

    pub fn movement_count(&self) -> Result<usize, StoreError> {
        Ok(self.shared.read()?.movements.len())
    }
}

#[async_trait]
impl ExistenceChecker for InMemoryStore {
    async fn warehouse_exists(&self, id: WarehouseId) -> Result<bool, StoreError> {
        Ok(self.shared.read()?.warehouses.contains_key(&id))
    }

    async fn product_exists(&self, id: ProductId) -> Result<bool, StoreError> {
        Ok(self.shared.read()?.products.contains_key(&id))
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_warehouse(&self, warehouse: NewWarehouse) -> Result<Warehouse, StoreError> {
        let mut tables = self.shared.write()?;
        let id = WarehouseId::new(next_key(&tables.warehouses));
        let created = warehouse.into_warehouse(id, Utc::now());
        tables.warehouses.insert(id, created.clone());
        Ok(created)
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        if product.stock < 0 {
            return Err(StoreError::Constraint("product stock must not be negative".to_string()));
        }
        let mut tables = self.shared.write()?;
        if tables.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::Duplicate(format!("product sku {}", product.sku)));
        }
        let id = ProductId::new(next_key(&tables.products));
        let created = product.into_product(id);
        tables.products.insert(id, created.clone());
        Ok(created)
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.shared.read()?.products.values().cloned().collect())
    }

    async fn list_low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut low: Vec<Product> = self
            .shared
            .read()?
            .products
            .values()
            .filter(|p| p.is_low_stock())
            .cloned()
            .collect();
        low.sort_by(|a, b| a.stock.cmp(&b.stock).then(a.id.cmp(&b.id)));
        Ok(low)
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryStore {
    type Unit = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork, StoreError> {
        Ok(InMemoryUnitOfWork {
            shared: self.shared.clone(),
            staged: Staged::default(),
            finished: false,
        })
    }
}

#[async_trait]
impl PurchaseReader for InMemoryStore {
    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>, StoreError> {
        Ok(self.shared.read()?.purchases.get(&id).cloned())
    }

    async fn list_purchases(&self) -> Result<Vec<Purchase>, StoreError> {
        let mut purchases: Vec<Purchase> = self.shared.read()?.purchases.values().cloned().collect();
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(purchases)
    }
}

#[async_trait]
impl MovementReader for InMemoryStore {
    async fn list_movements(&self, filter: MovementFilter) -> Result<Vec<InventoryMovement>, StoreError> {
        let mut movements: Vec<InventoryMovement> = self
            .shared
            .read()?
            .movements
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        movements.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(movements)
    }
}

#[derive(Debug, Default)]
struct Staged {
    purchases: Vec<Purchase>,
    items: Vec<PurchaseItem>,
    stock_deltas: Vec<(ProductId, i64)>,
    movements: Vec<InventoryMovement>,
}

impl Staged {
    fn is_empty(&self) -> bool {
        self.purchases.is_empty()
            && self.items.is_empty()
            && self.stock_deltas.is_empty()
            && self.movements.is_empty()
    }
}

/// Unit of work over [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    staged: Staged,
    finished: bool,
}

impl InMemoryUnitOfWork {
    fn purchase_known(&self, tables: &Tables, id: PurchaseId) -> bool {
        tables.purchases.contains_key(&id) || self.staged.purchases.iter().any(|p| p.id == id)
    }

    /// Verify every staged reference against committed state.
    fn check_references(&self, tables: &Tables) -> Result<(), StoreError> {
        for p in &self.staged.purchases {
            if !tables.warehouses.contains_key(&p.warehouse_id) {
                return Err(StoreError::ForeignKey(format!("warehouse {}", p.warehouse_id)));
            }
        }
        for i in &self.staged.items {
            if !tables.products.contains_key(&i.product_id) {
                return Err(StoreError::ForeignKey(format!("product {}", i.product_id)));
            }
            if !self.purchase_known(tables, i.purchase_id) {
                return Err(StoreError::ForeignKey(format!("purchase {}", i.purchase_id)));
            }
        }
        for (product_id, _) in &self.staged.stock_deltas {
            if !tables.products.contains_key(product_id) {
                return Err(StoreError::ForeignKey(format!("product {product_id}")));
            }
        }
        for m in &self.staged.movements {
            if !tables.products.contains_key(&m.product_id) {
                return Err(StoreError::ForeignKey(format!("product {}", m.product_id)));
            }
            if !tables.warehouses.contains_key(&m.warehouse_id) {
                return Err(StoreError::ForeignKey(format!("warehouse {}", m.warehouse_id)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PurchaseWriter for InMemoryUnitOfWork {
    async fn create_purchase(
        &mut self,
        warehouse_id: WarehouseId,
        created_by: UserId,
    ) -> Result<Purchase, StoreError> {
        if !self.shared.read()?.warehouses.contains_key(&warehouse_id) {
            return Err(StoreError::ForeignKey(format!("warehouse {warehouse_id}")));
        }

        let now = Utc::now();
        let purchase = Purchase {
            id: PurchaseId::new(next_id(&self.shared.purchase_seq)),
            warehouse_id,
            created_by,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        };
        self.staged.purchases.push(purchase.clone());
        Ok(purchase)
    }

    async fn create_purchase_item(
        &mut self,
        purchase_id: PurchaseId,
        item: &NewPurchaseItem,
    ) -> Result<PurchaseItem, StoreError> {
        if item.quantity <= 0 {
            return Err(StoreError::Constraint("purchase item quantity must be positive".to_string()));
        }
        if item.unit_price.is_some_and(|p| p < 0.0) {
            return Err(StoreError::Constraint("purchase item unit price must not be negative".to_string()));
        }
        {
            let tables = self.shared.read()?;
            if !tables.products.contains_key(&item.product_id) {
                return Err(StoreError::ForeignKey(format!("product {}", item.product_id)));
            }
            if !self.purchase_known(&tables, purchase_id) {
                return Err(StoreError::ForeignKey(format!("purchase {purchase_id}")));
            }
        }

        let created = PurchaseItem {
            id: PurchaseItemId::new(next_id(&self.shared.item_seq)),
            purchase_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        };
        self.staged.items.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl StockMutator for InMemoryUnitOfWork {
    async fn increment_stock(&mut self, product_id: ProductId, delta: i64) -> Result<(), StoreError> {
        if delta <= 0 {
            return Err(StoreError::InvalidWrite(format!(
                "stock increment must be positive, got {delta}"
            )));
        }
        if !self.shared.read()?.products.contains_key(&product_id) {
            return Err(StoreError::ForeignKey(format!("product {product_id}")));
        }
        // Applied as `stock += delta` under the write lock at commit.
        self.staged.stock_deltas.push((product_id, delta));
        Ok(())
    }
}

#[async_trait]
impl MovementRecorder for InMemoryUnitOfWork {
    async fn record_movement(
        &mut self,
        movement: NewInventoryMovement,
    ) -> Result<InventoryMovement, StoreError> {
        if movement.quantity <= 0 {
            return Err(StoreError::Constraint("movement quantity must be positive".to_string()));
        }
        {
            let tables = self.shared.read()?;
            if !tables.products.contains_key(&movement.product_id) {
                return Err(StoreError::ForeignKey(format!("product {}", movement.product_id)));
            }
            if !tables.warehouses.contains_key(&movement.warehouse_id) {
                return Err(StoreError::ForeignKey(format!("warehouse {}", movement.warehouse_id)));
            }
        }

        let recorded =
            movement.into_recorded(MovementId::new(next_id(&self.shared.movement_seq)), Utc::now());
        self.staged.movements.push(recorded.clone());
        Ok(recorded)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;

        if self.shared.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Commit("injected commit failure".to_string()));
        }

        let shared = self.shared.clone();
        let mut tables = shared.write()?;

        self.check_references(&tables)
            .map_err(|e| StoreError::Commit(e.to_string()))?;

        // Stock must stay non-negative once every delta is applied.
        let mut new_stock: BTreeMap<ProductId, i64> = BTreeMap::new();
        for (product_id, delta) in &self.staged.stock_deltas {
            let current = match new_stock.get(product_id) {
                Some(v) => *v,
                None => tables.products.get(product_id).map(|p| p.stock).unwrap_or(0),
            };
            let next = current
                .checked_add(*delta)
                .ok_or_else(|| StoreError::Commit(format!("stock overflow for product {product_id}")))?;
            new_stock.insert(*product_id, next);
        }
        if let Some((product_id, _)) = new_stock.iter().find(|(_, stock)| **stock < 0) {
            return Err(StoreError::Commit(format!("product {product_id} stock would be negative")));
        }

        let staged = std::mem::take(&mut self.staged);
        for purchase in staged.purchases {
            tables.purchases.insert(purchase.id(), purchase);
        }
        for item in staged.items {
            if let Some(purchase) = tables.purchases.get_mut(&item.purchase_id) {
                purchase.items.push(item);
            }
        }
        for (product_id, stock) in new_stock {
            if let Some(product) = tables.products.get_mut(&product_id) {
                product.stock = stock;
            }
        }
        tables.movements.extend(staged.movements);

        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.staged = Staged::default();
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished && !self.staged.is_empty() {
            tracing::warn!("unit of work dropped while open; staged writes discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_warehouse(Warehouse::named(WarehouseId::new(1), "Main"))
            .unwrap();
        store
            .insert_product(Product::with_stock(ProductId::new(5), "SKU-5", 20))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = seeded();
        let mut unit = store.begin().await.unwrap();

        let purchase = unit
            .create_purchase(WarehouseId::new(1), UserId::new(7))
            .await
            .unwrap();
        unit.create_purchase_item(purchase.id, &NewPurchaseItem::new(ProductId::new(5), 10))
            .await
            .unwrap();
        unit.increment_stock(ProductId::new(5), 10).await.unwrap();

        assert_eq!(store.product(ProductId::new(5)).unwrap().unwrap().stock, 20);
        assert!(store.get_purchase(purchase.id).await.unwrap().is_none());

        unit.commit().await.unwrap();

        assert_eq!(store.product(ProductId::new(5)).unwrap().unwrap().stock, 30);
        let stored = store.get_purchase(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.items.len(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_everything() {
        let store = seeded();
        let mut unit = store.begin().await.unwrap();
        let purchase = unit
            .create_purchase(WarehouseId::new(1), UserId::new(7))
            .await
            .unwrap();
        unit.increment_stock(ProductId::new(5), 3).await.unwrap();
        unit.rollback().await.unwrap();

        assert!(store.get_purchase(purchase.id).await.unwrap().is_none());
        assert_eq!(store.product(ProductId::new(5)).unwrap().unwrap().stock, 20);
    }

    #[tokio::test]
    async fn dropping_an_open_unit_discards_writes() {
        let store = seeded();
        {
            let mut unit = store.begin().await.unwrap();
            unit.increment_stock(ProductId::new(5), 3).await.unwrap();
        }
        assert_eq!(store.product(ProductId::new(5)).unwrap().unwrap().stock, 20);
    }

    #[tokio::test]
    async fn writes_referencing_missing_rows_fail() {
        let store = seeded();
        let mut unit = store.begin().await.unwrap();

        let err = unit
            .create_purchase(WarehouseId::new(99), UserId::new(7))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey(_)));

        let err = unit.increment_stock(ProductId::new(42), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey(_)));

        let err = unit
            .create_purchase_item(PurchaseId::new(12345), &NewPurchaseItem::new(ProductId::new(5), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey(_)));
    }

    #[tokio::test]
    async fn non_positive_increment_is_refused() {
        let store = seeded();
        let mut unit = store.begin().await.unwrap();
        let err = unit.increment_stock(ProductId::new(5), 0).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidWrite(_)));
        let err = unit.increment_stock(ProductId::new(5), -4).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidWrite(_)));
    }

    #[tokio::test]
    async fn commit_rechecks_references() {
        let store = seeded();
        let mut unit = store.begin().await.unwrap();
        unit.increment_stock(ProductId::new(5), 3).await.unwrap();

        store.remove_product(ProductId::new(5)).unwrap();

        let err = unit.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Commit(_)));
    }

    #[tokio::test]
    async fn concurrent_units_both_apply_their_deltas() {
        let store = seeded();
        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        a.increment_stock(ProductId::new(5), 10).await.unwrap();
        b.increment_stock(ProductId::new(5), 5).await.unwrap();

        b.commit().await.unwrap();
        a.commit().await.unwrap();

        assert_eq!(store.product(ProductId::new(5)).unwrap().unwrap().stock, 35);
    }

    fn new_product(sku: &str, stock: i64, reorder_level: i64) -> NewProduct {
        NewProduct {
            name: sku.to_string(),
            sku: sku.to_string(),
            price: 0.0,
            description: String::new(),
            stock,
            reorder_level,
        }
    }

    #[tokio::test]
    async fn created_catalog_rows_get_fresh_ids() {
        let store = seeded();

        let warehouse = store
            .create_warehouse(NewWarehouse {
                name: "Overflow".into(),
                location: "Dock 4".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(warehouse.id, WarehouseId::new(2));
        assert!(store.warehouse_exists(warehouse.id).await.unwrap());

        let product = store.create_product(new_product("SKU-NEW", 4, 0)).await.unwrap();
        assert_eq!(product.id, ProductId::new(6));
        assert!(store.product_exists(product.id).await.unwrap());
        assert_eq!(store.list_products().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_sku_is_refused() {
        let store = seeded();
        let err = store.create_product(new_product("SKU-5", 0, 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn low_stock_lists_products_at_or_under_reorder_level() {
        let store = seeded();
        let at = store.create_product(new_product("AT", 5, 5)).await.unwrap();
        let under = store.create_product(new_product("UNDER", 1, 5)).await.unwrap();
        store.create_product(new_product("OVER", 9, 5)).await.unwrap();

        let low: Vec<ProductId> = store
            .list_low_stock_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(low, vec![under.id, at.id]);
    }

    #[tokio::test]
    async fn movements_filter_and_order_newest_first() {
        let store = seeded();
        store
            .insert_product(Product::with_stock(ProductId::new(6), "SKU-6", 0))
            .unwrap();

        let mut unit = store.begin().await.unwrap();
        for (product, qty) in [(5, 1), (6, 2), (5, 3)] {
            unit.record_movement(NewInventoryMovement::purchase(
                ProductId::new(product),
                WarehouseId::new(1),
                qty,
                PurchaseId::new(1),
                UserId::new(7),
            ))
            .await
            .unwrap();
        }
        unit.commit().await.unwrap();

        let all = store.list_movements(MovementFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let only_five = store
            .list_movements(MovementFilter::for_product(ProductId::new(5)))
            .await
            .unwrap();
        assert_eq!(only_five.len(), 2);
        assert!(only_five.iter().all(|m| m.product_id == ProductId::new(5)));
    }
}
