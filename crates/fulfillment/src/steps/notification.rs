use async_trait::async_trait;
use domain::OrderRequest;
use orchestrator::{CancellationToken, Step, StepError};
use transactor::RecordSession;

use crate::order_fulfillment::STEP_SEND_NOTIFICATION;
use crate::services::{Notification, Notifier};

/// Sends the order confirmation to the contact address.
///
/// Delivery is best effort: a failed send is logged and counted, and the run
/// carries on.
pub struct SendNotificationStep<N: Notifier> {
    notifier: N,
}

impl<N: Notifier> SendNotificationStep<N> {
    pub fn new(notifier: N) -> Self {
        Self { notifier }
    }
}

fn confirmation(data: &OrderRequest) -> Notification {
    let payment = data.payment_confirmation.as_deref().unwrap_or("pending");
    Notification {
        recipient: data.contact_email.clone(),
        subject: format!("Order {} confirmed", data.order_id),
        body: format!(
            "{} item(s), total {}. Payment reference {}.",
            data.unit_count(),
            data.total,
            payment
        ),
    }
}

#[async_trait]
impl<N, S> Step<OrderRequest, S> for SendNotificationStep<N>
where
    N: Notifier,
    S: RecordSession,
{
    fn name(&self) -> &str {
        STEP_SEND_NOTIFICATION
    }

    async fn execute(
        &self,
        _session: &mut S,
        data: &mut OrderRequest,
        _cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        match self.notifier.send(confirmation(data)).await {
            Ok(()) => {
                tracing::debug!(order_id = %data.order_id, "confirmation sent");
            }
            Err(e) => {
                metrics::counter!("notification_failures").increment(1);
                tracing::warn!(
                    order_id = %data.order_id,
                    error = %e,
                    "confirmation not sent, continuing"
                );
            }
        }
        Ok(())
    }
}
