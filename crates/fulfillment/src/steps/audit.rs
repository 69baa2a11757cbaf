use async_trait::async_trait;
use chrono::Utc;
use domain::OrderRequest;
use orchestrator::{CancellationToken, Step, StepError};
use transactor::{RecordSession, RecordSessionExt};

use crate::order_fulfillment::{AUDIT_LOG, STEP_AUDIT_LOG};
use crate::records::AuditRecord;

/// Action recorded for a placed order.
pub const ORDER_PLACED: &str = "order_placed";

/// Writes the audit entry for the order inside the same transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLogStep;

#[async_trait]
impl<S: RecordSession> Step<OrderRequest, S> for AuditLogStep {
    fn name(&self) -> &str {
        STEP_AUDIT_LOG
    }

    async fn execute(
        &self,
        session: &mut S,
        data: &mut OrderRequest,
        _cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let record = AuditRecord {
            order_id: data.order_id,
            action: ORDER_PLACED.to_string(),
            line_count: data.items.len(),
            unit_count: data.unit_count(),
            total: data.total,
            payment_id: data.payment_confirmation.clone(),
            recorded_at: Utc::now(),
        };
        session
            .upsert_as(AUDIT_LOG, &data.order_id.to_string(), &record)
            .await?;
        Ok(())
    }
}
