//! Stock level endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use fulfillment::StockRecord;
use fulfillment::order_fulfillment::INVENTORY;
use serde::{Deserialize, Serialize};
use transactor::{RecordSession, RecordSessionExt, TransactionCoordinator, TransactionalResource};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::read_record;

#[derive(Deserialize)]
pub struct SetStockRequest {
    pub available: u32,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub product_id: String,
    pub available: u32,
}

impl From<StockRecord> for StockResponse {
    fn from(record: StockRecord) -> Self {
        Self {
            product_id: record.product_id.to_string(),
            available: record.available,
        }
    }
}

/// PUT /inventory/{sku}: set the stock level of a product.
#[tracing::instrument(skip(state, req))]
pub async fn set<R>(
    State(state): State<Arc<AppState<R>>>,
    Path(sku): Path<String>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<StockResponse>, ApiError>
where
    R: TransactionalResource + Clone + 'static,
    R::Session: RecordSession + 'static,
{
    if sku.trim().is_empty() {
        return Err(ApiError::BadRequest("SKU must not be empty".to_string()));
    }
    let record = StockRecord::new(sku.as_str(), req.available);

    let mut coordinator = TransactionCoordinator::new(state.resource.clone());
    coordinator.begin().await?;
    let written = match coordinator.session() {
        Ok(session) => session
            .upsert_as(INVENTORY, &sku, &record)
            .await
            .map_err(ApiError::from),
        Err(e) => Err(ApiError::from(e)),
    };
    let committed = match written {
        Ok(()) => coordinator.commit().await.map_err(ApiError::from),
        Err(e) => Err(e),
    };
    let released = coordinator.release().await;

    committed?;
    released?;
    tracing::info!(product_id = %sku, available = req.available, "stock updated");
    Ok(Json(record.into()))
}

/// GET /inventory/{sku}: read the committed stock level of a product.
#[tracing::instrument(skip(state))]
pub async fn get<R>(
    State(state): State<Arc<AppState<R>>>,
    Path(sku): Path<String>,
) -> Result<Json<StockResponse>, ApiError>
where
    R: TransactionalResource + Clone + 'static,
    R::Session: RecordSession + 'static,
{
    let record: StockRecord = read_record(&state.resource, INVENTORY, &sku)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {sku} not found")))?;

    Ok(Json(record.into()))
}
