use async_trait::async_trait;
use domain::OrderRequest;
use orchestrator::{CancellationToken, Step, StepError};
use transactor::{RecordSession, RecordSessionExt};

use crate::error::FulfillmentError;
use crate::order_fulfillment::{INVENTORY, STEP_RESERVE_INVENTORY};
use crate::records::StockRecord;

/// Decrements stock for every line of the order.
///
/// Lines are reserved in order and each reads the stock left by the lines
/// before it, so repeated SKUs are counted together. The first line that
/// cannot be covered fails the step.
///
/// Stock is read for update: a concurrent run that reserved the same product
/// first either blocks this read or makes this run's flush or commit fail, so
/// stock is never oversold.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReserveInventoryStep;

#[async_trait]
impl<S: RecordSession> Step<OrderRequest, S> for ReserveInventoryStep {
    fn name(&self) -> &str {
        STEP_RESERVE_INVENTORY
    }

    async fn execute(
        &self,
        session: &mut S,
        data: &mut OrderRequest,
        _cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        for item in &data.items {
            let sku = item.product_id.as_str();
            let mut stock: StockRecord = session
                .fetch_for_update_as(INVENTORY, sku)
                .await?
                .ok_or_else(|| FulfillmentError::UnknownProduct(item.product_id.clone()))?;

            if stock.available < item.quantity {
                return Err(FulfillmentError::InsufficientStock {
                    product_id: item.product_id.clone(),
                    requested: item.quantity,
                    available: stock.available,
                }
                .into());
            }

            stock.available -= item.quantity;
            session.upsert_as(INVENTORY, sku, &stock).await?;
            tracing::debug!(
                product_id = sku,
                reserved = item.quantity,
                remaining = stock.available,
                "stock reserved"
            );
        }
        Ok(())
    }
}
