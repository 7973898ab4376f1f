//! Purchasing domain module (stock receipts into a warehouse).
//!
//! This crate contains the purchase/ledger data model and the request-level
//! business rules, implemented purely as deterministic domain logic (no IO,
//! no HTTP, no storage).

pub mod catalog;
pub mod movement;
pub mod purchase;
pub mod validation;

pub use catalog::{NewProduct, NewWarehouse, Product, Warehouse};
pub use movement::{InventoryMovement, MovementFilter, MovementType, NewInventoryMovement};
pub use purchase::{CreatePurchase, NewPurchaseItem, Purchase, PurchaseItem};
pub use validation::{ItemValidationError, validate_items};
