//! Purchase receipt workflow.
//!
//! ```text
//! CreatePurchase
//!   ↓
//! 1. Validate items (non-empty, quantity > 0, unit price >= 0)
//!   ↓
//! 2. Warehouse exists?         ── no → WarehouseNotFound
//!   ↓
//! 3. Every product exists?     ── no → ProductNotFound (first missing id)
//!   ↓
//! 4. Begin unit of work
//!   ↓
//! 5. Header, then per line: item → stock += quantity → movement
//!   ↓
//! 6. Commit (any failure in 5 or 6 → rollback, nothing visible)
//! ```
//!
//! Steps 1-3 perform no writes. Steps 5-6 share one deadline; an expired
//! unit is rolled back (or dropped mid-commit) and reported as
//! [`StoreError::Timeout`].

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, timeout_at};
use tracing::instrument;

use stockroom_core::{ProductId, UserId, WarehouseId};
use stockroom_purchasing::{
    CreatePurchase, ItemValidationError, NewInventoryMovement, Purchase, validate_items,
};

use crate::store::{ExistenceChecker, StoreError, UnitOfWork, UnitOfWorkFactory};

pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error(transparent)]
    Validation(#[from] ItemValidationError),

    #[error("warehouse not found")]
    WarehouseNotFound(WarehouseId),

    #[error("product not found: product_id={0}")]
    ProductNotFound(ProductId),

    /// Storage failed; the unit of work was rolled back.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// Runs the purchase workflow against a checker and a unit-of-work factory.
///
/// Both seams are usually the same store (`Arc<InMemoryStore>` or
/// `PostgresStore`), but tests substitute either side independently.
#[derive(Debug, Clone)]
pub struct PurchaseCoordinator<C, F> {
    checker: C,
    units: F,
    tx_timeout: Duration,
}

impl<C, F> PurchaseCoordinator<C, F>
where
    C: ExistenceChecker,
    F: UnitOfWorkFactory,
{
    pub fn new(checker: C, units: F) -> Self {
        Self {
            checker,
            units,
            tx_timeout: DEFAULT_TX_TIMEOUT,
        }
    }

    pub fn with_tx_timeout(mut self, tx_timeout: Duration) -> Self {
        self.tx_timeout = tx_timeout;
        self
    }

    /// Record a purchase receipt atomically.
    ///
    /// On success every line has an item row, a stock increment and a
    /// movement row, all committed together. On any error nothing is written.
    #[instrument(
        skip(self, request, actor),
        fields(warehouse_id = %request.warehouse_id, lines = request.items.len(), actor = %actor),
        err(Display)
    )]
    pub async fn create_purchase(
        &self,
        request: CreatePurchase,
        actor: UserId,
    ) -> Result<Purchase, PurchaseError> {
        if let Err(e) = validate_items(&request.items) {
            tracing::debug!(error = %e, product_id = ?e.product_id(), "purchase rejected by validation");
            return Err(e.into());
        }

        if !self.checker.warehouse_exists(request.warehouse_id).await? {
            tracing::info!("warehouse not found");
            return Err(PurchaseError::WarehouseNotFound(request.warehouse_id));
        }

        for product_id in request.distinct_product_ids() {
            if !self.checker.product_exists(product_id).await? {
                tracing::info!(product_id = %product_id, "product not found");
                return Err(PurchaseError::ProductNotFound(product_id));
            }
        }

        let mut unit = self.units.begin().await?;
        let deadline = Instant::now() + self.tx_timeout;

        let outcome = match timeout_at(deadline, apply_lines(&mut unit, &request, actor)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.tx_timeout)),
        };

        let purchase = match outcome {
            Ok(purchase) => purchase,
            Err(e) => {
                tracing::warn!(error = %e, "purchase rolled back");
                if let Err(rollback_err) = unit.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                return Err(e.into());
            }
        };

        // An expired commit drops the unit, which discards its writes.
        match timeout_at(deadline, unit.commit()).await {
            Ok(committed) => committed?,
            Err(_) => {
                tracing::warn!("commit did not finish before the deadline; unit abandoned");
                return Err(StoreError::Timeout(self.tx_timeout).into());
            }
        }

        tracing::info!(
            purchase_id = %purchase.id,
            items = purchase.items.len(),
            "purchase committed"
        );
        Ok(purchase)
    }
}

/// Every write of one purchase, in order. Stops at the first failure.
async fn apply_lines<U: UnitOfWork>(
    unit: &mut U,
    request: &CreatePurchase,
    actor: UserId,
) -> Result<Purchase, StoreError> {
    let mut purchase = unit.create_purchase(request.warehouse_id, actor).await?;

    for line in &request.items {
        let item = unit.create_purchase_item(purchase.id, line).await?;
        unit.increment_stock(line.product_id, line.quantity).await?;
        unit.record_movement(NewInventoryMovement::purchase(
            line.product_id,
            request.warehouse_id,
            line.quantity,
            purchase.id,
            actor,
        ))
        .await?;

        purchase
            .attach_item(item)
            .map_err(|e| StoreError::InvalidWrite(e.to_string()))?;
    }

    Ok(purchase)
}
