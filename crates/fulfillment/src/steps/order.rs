use async_trait::async_trait;
use domain::OrderRequest;
use orchestrator::{CancellationToken, Step, StepError};
use transactor::{RecordSession, RecordSessionExt};

use crate::error::FulfillmentError;
use crate::order_fulfillment::{ORDERS, STEP_CREATE_ORDER};
use crate::records::OrderRecord;

/// Persists the confirmed order.
///
/// Requires the payment confirmation set by the payment step. The record is
/// inserted, so resubmitting an order ID fails when the session is flushed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOrderStep;

#[async_trait]
impl<S: RecordSession> Step<OrderRequest, S> for CreateOrderStep {
    fn name(&self) -> &str {
        STEP_CREATE_ORDER
    }

    async fn execute(
        &self,
        session: &mut S,
        data: &mut OrderRequest,
        _cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let payment_id = data
            .payment_confirmation
            .clone()
            .ok_or(FulfillmentError::MissingPaymentConfirmation)?;

        let record = OrderRecord::confirmed(data, payment_id);
        session
            .insert_as(ORDERS, &data.order_id.to_string(), &record)
            .await?;
        tracing::debug!(order_id = %data.order_id, "order record created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::{LineItem, Money};
    use transactor::{InMemoryResource, ResourceError, TransactionalResource};

    use super::*;
    use crate::records::OrderStatus;

    fn paid_request() -> OrderRequest {
        let mut request = OrderRequest::new(
            vec![LineItem::new("SKU-A", "Widget", 1, Money::from_cents(999))],
            "tok_visa",
            "ada@example.com",
        )
        .unwrap();
        request.payment_confirmation = Some("PAY-0042".to_string());
        request
    }

    #[tokio::test]
    async fn test_creates_confirmed_order() {
        let resource = InMemoryResource::new();
        let mut session = resource.begin().await.unwrap();
        let mut data = paid_request();

        CreateOrderStep
            .execute(&mut session, &mut data, &CancellationToken::new())
            .await
            .unwrap();
        resource.commit(&mut session).await.unwrap();

        let stored = resource.get(ORDERS, &data.order_id.to_string()).unwrap();
        let stored: OrderRecord = serde_json::from_value(stored).unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.payment_id, "PAY-0042");
        assert_eq!(stored.total, Money::from_cents(999));
    }

    #[tokio::test]
    async fn test_requires_payment_confirmation() {
        let resource = InMemoryResource::new();
        let mut session = resource.begin().await.unwrap();
        let mut data = paid_request();
        data.payment_confirmation = None;

        let err = CreateOrderStep
            .execute(&mut session, &mut data, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_domain::<FulfillmentError>(),
            Some(&FulfillmentError::MissingPaymentConfirmation)
        );
    }

    #[tokio::test]
    async fn test_duplicate_order_rejected_on_flush() {
        let resource = InMemoryResource::new();
        let mut data = paid_request();
        resource.seed(ORDERS, &data.order_id.to_string(), serde_json::json!({}));
        let mut session = resource.begin().await.unwrap();

        CreateOrderStep
            .execute(&mut session, &mut data, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            resource.flush(&mut session).await,
            Err(ResourceError::Constraint { .. })
        ));
    }
}
