use std::sync::Arc;

use stockroom_core::{PurchaseId, UserId};
use stockroom_infra::store::{
    InMemoryStore, MovementReader, PostgresStore, PurchaseReader, StoreError,
};
use stockroom_infra::{AppConfig, Catalog, CatalogError, PurchaseCoordinator, PurchaseError};
use stockroom_purchasing::{
    CreatePurchase, InventoryMovement, MovementFilter, NewProduct, NewWarehouse, Product, Purchase,
    Warehouse,
};

/// Storage wiring behind the HTTP handlers.
pub enum AppServices {
    /// In-memory backend (dev/test).
    InMemory {
        store: Arc<InMemoryStore>,
        catalog: Catalog<Arc<InMemoryStore>>,
        coordinator: PurchaseCoordinator<Arc<InMemoryStore>, Arc<InMemoryStore>>,
    },
    /// Postgres backend.
    Persistent {
        store: PostgresStore,
        catalog: Catalog<PostgresStore>,
        coordinator: PurchaseCoordinator<PostgresStore, PostgresStore>,
    },
}

impl AppServices {
    pub fn in_memory(store: Arc<InMemoryStore>, config: &AppConfig) -> Self {
        let coordinator = PurchaseCoordinator::new(store.clone(), store.clone())
            .with_tx_timeout(config.purchase_tx_timeout);
        AppServices::InMemory {
            catalog: Catalog::new(store.clone()),
            store,
            coordinator,
        }
    }

    pub fn persistent(store: PostgresStore, config: &AppConfig) -> Self {
        let coordinator = PurchaseCoordinator::new(store.clone(), store.clone())
            .with_tx_timeout(config.purchase_tx_timeout);
        AppServices::Persistent {
            catalog: Catalog::new(store.clone()),
            store,
            coordinator,
        }
    }

    pub async fn create_warehouse(&self, warehouse: NewWarehouse) -> Result<Warehouse, CatalogError> {
        match self {
            AppServices::InMemory { catalog, .. } => catalog.create_warehouse(warehouse).await,
            AppServices::Persistent { catalog, .. } => catalog.create_warehouse(warehouse).await,
        }
    }

    pub async fn create_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        match self {
            AppServices::InMemory { catalog, .. } => catalog.create_product(product).await,
            AppServices::Persistent { catalog, .. } => catalog.create_product(product).await,
        }
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        match self {
            AppServices::InMemory { catalog, .. } => catalog.list_products().await,
            AppServices::Persistent { catalog, .. } => catalog.list_products().await,
        }
    }

    pub async fn low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        match self {
            AppServices::InMemory { catalog, .. } => catalog.low_stock_products().await,
            AppServices::Persistent { catalog, .. } => catalog.low_stock_products().await,
        }
    }

    pub async fn create_purchase(
        &self,
        request: CreatePurchase,
        actor: UserId,
    ) -> Result<Purchase, PurchaseError> {
        match self {
            AppServices::InMemory { coordinator, .. } => coordinator.create_purchase(request, actor).await,
            AppServices::Persistent { coordinator, .. } => coordinator.create_purchase(request, actor).await,
        }
    }

    pub async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>, StoreError> {
        match self {
            AppServices::InMemory { store, .. } => store.get_purchase(id).await,
            AppServices::Persistent { store, .. } => store.get_purchase(id).await,
        }
    }

    pub async fn list_purchases(&self) -> Result<Vec<Purchase>, StoreError> {
        match self {
            AppServices::InMemory { store, .. } => store.list_purchases().await,
            AppServices::Persistent { store, .. } => store.list_purchases().await,
        }
    }

    pub async fn list_movements(
        &self,
        filter: MovementFilter,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        match self {
            AppServices::InMemory { store, .. } => store.list_movements(filter).await,
            AppServices::Persistent { store, .. } => store.list_movements(filter).await,
        }
    }
}

/// Pick the backend from configuration.
///
/// With a database configured this connects and applies migrations; failures
/// are returned so startup aborts.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    match &config.database {
        Some(db) => {
            let store = PostgresStore::connect(db).await?;
            store.migrate().await?;
            tracing::info!("using postgres store");
            Ok(AppServices::persistent(store, config))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (starts empty, data is lost on restart)");
            Ok(AppServices::in_memory(Arc::new(InMemoryStore::new()), config))
        }
    }
}
