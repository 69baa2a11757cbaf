//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{Money, RequestId};

use crate::error::{FulfillmentError, Result};

/// Result of a successful charge.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    /// The payment ID assigned by the gateway.
    pub payment_id: String,
}

/// Trait for charging an order's payment method.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount` against the opaque payment reference.
    async fn charge(
        &self,
        order_id: RequestId,
        payment_reference: &str,
        amount: Money,
    ) -> Result<PaymentReceipt>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    charges: HashMap<String, (RequestId, Money)>,
    next_id: u32,
    fail_on_charge: bool,
}

/// In-memory payment gateway for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline every charge.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_charge = fail;
    }

    /// Returns the number of accepted charges.
    pub fn charge_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .charges
            .len()
    }

    /// Returns the amount charged under the given payment ID.
    pub fn charged_amount(&self, payment_id: &str) -> Option<Money> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .charges
            .get(payment_id)
            .map(|(_, amount)| *amount)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(
        &self,
        order_id: RequestId,
        payment_reference: &str,
        amount: Money,
    ) -> Result<PaymentReceipt> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_charge {
            return Err(FulfillmentError::PaymentDeclined(format!(
                "card {payment_reference} declined"
            )));
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state
            .charges
            .insert(payment_id.clone(), (order_id, amount));

        Ok(PaymentReceipt { payment_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_charge_records_amount() {
        let gateway = InMemoryPaymentGateway::new();

        let receipt = gateway
            .charge(RequestId::new(), "tok_visa", Money::from_cents(5000))
            .await
            .unwrap();

        assert_eq!(receipt.payment_id, "PAY-0001");
        assert_eq!(gateway.charge_count(), 1);
        assert_eq!(
            gateway.charged_amount(&receipt.payment_id),
            Some(Money::from_cents(5000))
        );
    }

    #[tokio::test]
    async fn test_declined_charge() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_charge(true);

        let err = gateway
            .charge(RequestId::new(), "tok_expired", Money::from_cents(100))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            FulfillmentError::PaymentDeclined("card tok_expired declined".to_string())
        );
        assert_eq!(gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_payment_ids() {
        let gateway = InMemoryPaymentGateway::new();
        let order_id = RequestId::new();

        let r1 = gateway
            .charge(order_id, "tok", Money::from_cents(1))
            .await
            .unwrap();
        let r2 = gateway
            .charge(order_id, "tok", Money::from_cents(1))
            .await
            .unwrap();

        assert_eq!(r1.payment_id, "PAY-0001");
        assert_eq!(r2.payment_id, "PAY-0002");
    }
}
