//! Fulfillment error types.

use domain::ProductId;
use orchestrator::StepError;
use thiserror::Error;

/// Business failures raised by the fulfillment steps and their services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    /// A line asks for more units than are in stock.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// No inventory record exists for the product.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    /// The payment gateway refused the charge.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// An order record was requested before payment succeeded.
    #[error("Order has no payment confirmation")]
    MissingPaymentConfirmation,

    /// The notification could not be delivered.
    #[error("Notification service error: {0}")]
    Notification(String),
}

impl From<FulfillmentError> for StepError {
    fn from(err: FulfillmentError) -> Self {
        StepError::domain(err)
    }
}

/// Convenience type alias for fulfillment service results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
