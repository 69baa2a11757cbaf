//! Domain error types.

use thiserror::Error;

use crate::{Money, ProductId};

/// Reasons an order request is rejected before any step runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The request has no line items.
    #[error("Order request has no items")]
    NoItems,

    /// A line item has a zero quantity.
    #[error("Invalid quantity for product {product_id}: must be at least 1")]
    InvalidQuantity { product_id: ProductId },

    /// A line item has a negative unit price.
    #[error("Invalid price for product {product_id}: {price}")]
    InvalidPrice { product_id: ProductId, price: Money },

    /// A line total or the order total does not fit in an amount.
    #[error("Order amount overflows: {context}")]
    AmountOverflow { context: String },

    /// The declared total does not match the sum of the line items.
    #[error("Total mismatch: declared {declared}, items sum to {computed}")]
    TotalMismatch { declared: Money, computed: Money },

    /// The payment reference is blank.
    #[error("Payment reference is required")]
    MissingPaymentReference,

    /// The contact address is not an email address.
    #[error("Invalid contact email: {0}")]
    InvalidContactEmail(String),
}
