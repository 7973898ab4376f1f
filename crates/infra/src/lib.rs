//! Infrastructure layer: storage backends and the services built on them.

pub mod catalog;
pub mod config;
pub mod purchase_coordinator;
pub mod store;

pub use catalog::{Catalog, CatalogError};
pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use purchase_coordinator::{PurchaseCoordinator, PurchaseError};
