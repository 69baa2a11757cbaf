use async_trait::async_trait;
use chrono::Utc;
use domain::OrderRequest;
use orchestrator::{CancellationToken, Step, StepError};
use transactor::{RecordSession, RecordSessionExt};

use crate::order_fulfillment::{PAYMENTS, STEP_PROCESS_PAYMENT};
use crate::records::PaymentRecord;
use crate::services::PaymentGateway;

/// Charges the order total and records the payment.
///
/// On success the gateway's payment ID is written to
/// `OrderRequest::payment_confirmation` for the steps that follow.
pub struct ProcessPaymentStep<P: PaymentGateway> {
    gateway: P,
}

impl<P: PaymentGateway> ProcessPaymentStep<P> {
    pub fn new(gateway: P) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl<P, S> Step<OrderRequest, S> for ProcessPaymentStep<P>
where
    P: PaymentGateway,
    S: RecordSession,
{
    fn name(&self) -> &str {
        STEP_PROCESS_PAYMENT
    }

    async fn execute(
        &self,
        session: &mut S,
        data: &mut OrderRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        // The charge cannot be undone by a rollback
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let receipt = self
            .gateway
            .charge(data.order_id, &data.payment_reference, data.total)
            .await?;

        let record = PaymentRecord {
            payment_id: receipt.payment_id.clone(),
            order_id: data.order_id,
            amount: data.total,
            payment_reference: data.payment_reference.clone(),
            charged_at: Utc::now(),
        };
        session
            .insert_as(PAYMENTS, &data.order_id.to_string(), &record)
            .await?;

        tracing::info!(
            order_id = %data.order_id,
            payment_id = %receipt.payment_id,
            amount = %data.total,
            "payment charged"
        );
        data.payment_confirmation = Some(receipt.payment_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::{LineItem, Money};
    use transactor::{InMemoryResource, TransactionalResource};

    use super::*;
    use crate::error::FulfillmentError;
    use crate::services::InMemoryPaymentGateway;

    fn request() -> OrderRequest {
        OrderRequest::new(
            vec![LineItem::new("SKU-A", "Widget", 2, Money::from_cents(1250))],
            "tok_visa",
            "ada@example.com",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_charges_total_and_sets_confirmation() {
        let resource = InMemoryResource::new();
        let gateway = InMemoryPaymentGateway::new();
        let step = ProcessPaymentStep::new(gateway.clone());
        let mut session = resource.begin().await.unwrap();
        let mut data = request();

        step.execute(&mut session, &mut data, &CancellationToken::new())
            .await
            .unwrap();
        resource.commit(&mut session).await.unwrap();

        assert_eq!(data.payment_confirmation.as_deref(), Some("PAY-0001"));
        assert_eq!(
            gateway.charged_amount("PAY-0001"),
            Some(Money::from_cents(2500))
        );
        let stored = resource
            .get(PAYMENTS, &data.order_id.to_string())
            .unwrap();
        let stored: PaymentRecord = serde_json::from_value(stored).unwrap();
        assert_eq!(stored.payment_id, "PAY-0001");
        assert_eq!(stored.amount, Money::from_cents(2500));
    }

    #[tokio::test]
    async fn test_declined_charge_fails_step() {
        let resource = InMemoryResource::new();
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_charge(true);
        let step = ProcessPaymentStep::new(gateway);
        let mut session = resource.begin().await.unwrap();
        let mut data = request();

        let err = step
            .execute(&mut session, &mut data, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_domain::<FulfillmentError>(),
            Some(FulfillmentError::PaymentDeclined(_))
        ));
        assert!(data.payment_confirmation.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_charge() {
        let resource = InMemoryResource::new();
        let gateway = InMemoryPaymentGateway::new();
        let step = ProcessPaymentStep::new(gateway.clone());
        let mut session = resource.begin().await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = step
            .execute(&mut session, &mut request(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::Cancelled));
        assert_eq!(gateway.charge_count(), 0);
    }
}
