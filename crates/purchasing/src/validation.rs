//! Request-level validation of purchase lines.
//!
//! Runs before any existence check or storage access, so a doomed request
//! never opens a unit of work.

use thiserror::Error;

use stockroom_core::ProductId;

use crate::purchase::NewPurchaseItem;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    #[error("purchase items are required")]
    EmptyItems,

    #[error("quantity must be greater than zero")]
    InvalidQuantity { product_id: ProductId },

    #[error("unit price must not be negative")]
    NegativeUnitPrice { product_id: ProductId },

    #[error("unit price must be a finite number")]
    NonFiniteUnitPrice { product_id: ProductId },
}

impl ItemValidationError {
    /// Product of the offending line, if the failure is line-specific.
    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            ItemValidationError::EmptyItems => None,
            ItemValidationError::InvalidQuantity { product_id }
            | ItemValidationError::NegativeUnitPrice { product_id }
            | ItemValidationError::NonFiniteUnitPrice { product_id } => Some(*product_id),
        }
    }
}

/// Validate the line list of a purchase request.
///
/// Fails on the first offending line, in submission order.
pub fn validate_items(items: &[NewPurchaseItem]) -> Result<(), ItemValidationError> {
    if items.is_empty() {
        return Err(ItemValidationError::EmptyItems);
    }

    for item in items {
        if item.quantity <= 0 {
            return Err(ItemValidationError::InvalidQuantity {
                product_id: item.product_id,
            });
        }
        if let Some(price) = item.unit_price {
            if !price.is_finite() {
                return Err(ItemValidationError::NonFiniteUnitPrice {
                    product_id: item.product_id,
                });
            }
            if price < 0.0 {
                return Err(ItemValidationError::NegativeUnitPrice {
                    product_id: item.product_id,
                });
            }
        }
    }

    Ok(())
}
