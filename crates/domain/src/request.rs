//! The order request shared by every step of a run.

use common::RequestId;
use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::value_objects::{LineItem, Money};

/// All information the fulfillment steps need for one order.
///
/// The shape is fixed; steps only mutate declared fields. Output a later
/// step depends on (such as the payment confirmation) is written here rather
/// than passed between steps directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Unique identifier of the order.
    pub order_id: RequestId,

    /// Ordered line items.
    pub items: Vec<LineItem>,

    /// Total amount to charge.
    pub total: Money,

    /// Opaque reference handed to the payment gateway.
    pub payment_reference: String,

    /// Address that receives the order confirmation.
    pub contact_email: String,

    /// Charge identifier, set once payment succeeds.
    #[serde(default)]
    pub payment_confirmation: Option<String>,
}

impl OrderRequest {
    /// Creates a request with a fresh ID and a total computed from the items.
    ///
    /// Fails with [`RequestError::AmountOverflow`] when the items total does
    /// not fit in an amount.
    pub fn new(
        items: Vec<LineItem>,
        payment_reference: impl Into<String>,
        contact_email: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let total = sum_line_totals(&items)?;
        Ok(Self {
            order_id: RequestId::new(),
            items,
            total,
            payment_reference: payment_reference.into(),
            contact_email: contact_email.into(),
            payment_confirmation: None,
        })
    }

    /// Returns the sum of all line totals.
    pub fn items_total(&self) -> Result<Money, RequestError> {
        sum_line_totals(&self.items)
    }

    /// Returns the total number of units across all lines.
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Checks the request before it is handed to the orchestrator.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.items.is_empty() {
            return Err(RequestError::NoItems);
        }

        for item in &self.items {
            if item.quantity == 0 {
                return Err(RequestError::InvalidQuantity {
                    product_id: item.product_id.clone(),
                });
            }
            if item.unit_price.is_negative() {
                return Err(RequestError::InvalidPrice {
                    product_id: item.product_id.clone(),
                    price: item.unit_price,
                });
            }
        }

        let computed = self.items_total()?;
        if computed != self.total {
            return Err(RequestError::TotalMismatch {
                declared: self.total,
                computed,
            });
        }

        if self.payment_reference.trim().is_empty() {
            return Err(RequestError::MissingPaymentReference);
        }

        let email = self.contact_email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, host)| !local.is_empty() && host.contains('.'));
        if !valid_email {
            return Err(RequestError::InvalidContactEmail(
                self.contact_email.clone(),
            ));
        }

        Ok(())
    }
}

fn sum_line_totals(items: &[LineItem]) -> Result<Money, RequestError> {
    items.iter().try_fold(Money::zero(), |total, item| {
        item.total_price()
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| RequestError::AmountOverflow {
                context: format!(
                    "{} x {} for product {}",
                    item.quantity, item.unit_price, item.product_id
                ),
            })
    })
}
