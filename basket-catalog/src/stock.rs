use crate::product::Product;

/// Why a requested line item cannot be fulfilled from current stock.
#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("product {name} is not available for sale")]
    Inactive { name: String },

    #[error("quantity must be a positive whole number")]
    NonPositiveQuantity,

    #[error("insufficient stock for {name}: requested {requested}, available {available}")]
    Insufficient {
        name: String,
        requested: u32,
        available: i64,
    },
}

/// Validate that `quantity` units of `product` can be sold right now.
/// This is a point-in-time check; the actual decrement happens atomically at
/// the storage layer and may still fail under concurrent checkouts.
pub fn ensure_available(product: &Product, quantity: u32) -> Result<(), StockError> {
    if quantity == 0 {
        return Err(StockError::NonPositiveQuantity);
    }
    if !product.is_active {
        return Err(StockError::Inactive {
            name: product.name.clone(),
        });
    }
    if i64::from(quantity) > product.stock {
        return Err(StockError::Insufficient {
            name: product.name.clone(),
            requested: quantity,
            available: product.stock,
        });
    }
    Ok(())
}
