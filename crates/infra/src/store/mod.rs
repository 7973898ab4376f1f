//! Relational storage boundary for the catalog, purchases and the movement
//! ledger.
//!
//! The traits in [`r#trait`] are the only thing the purchase workflow and the
//! catalog endpoints know about storage. Two interchangeable backends
//! implement them: an in-memory one (tests/dev) and a Postgres one
//! (production).

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryStore, InMemoryUnitOfWork};
pub use postgres::{PostgresStore, PostgresUnitOfWork};
pub use r#trait::{
    CatalogStore, ExistenceChecker, MovementReader, MovementRecorder, PurchaseReader, PurchaseWriter,
    StockMutator, StoreError, UnitOfWork, UnitOfWorkFactory,
};
