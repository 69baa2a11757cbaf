//! Order placement and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{LineItem, Money, OrderRequest, RequestError, RequestId};
use fulfillment::OrderRecord;
use fulfillment::order_fulfillment::ORDERS;
use orchestrator::RunState;
use serde::{Deserialize, Serialize};
use transactor::{RecordSession, TransactionalResource};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::read_record;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<LineItemRequest>,
    pub payment_reference: String,
    pub contact_email: String,
    /// Declared total; computed from the items when omitted.
    pub total_cents: Option<i64>,
}

#[derive(Deserialize)]
pub struct LineItemRequest {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl PlaceOrderRequest {
    fn into_order(self) -> Result<OrderRequest, RequestError> {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                LineItem::new(
                    item.product_id,
                    item.product_name,
                    item.quantity,
                    Money::from_cents(item.unit_price_cents),
                )
            })
            .collect();
        let mut order = OrderRequest::new(items, self.payment_reference, self.contact_email)?;
        if let Some(cents) = self.total_cents {
            order.total = Money::from_cents(cents);
        }
        Ok(order)
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: String,
    pub state: RunState,
    pub payment_id: Option<String>,
    pub total_cents: i64,
    pub steps: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
    pub items: Vec<LineItemResponse>,
    pub total_cents: i64,
    pub contact_email: String,
    pub payment_id: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct LineItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl From<OrderRecord> for OrderResponse {
    fn from(record: OrderRecord) -> Self {
        Self {
            order_id: record.order_id.to_string(),
            status: format!("{:?}", record.status),
            items: record
                .items
                .into_iter()
                .map(|item| LineItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                })
                .collect(),
            total_cents: record.total.cents(),
            contact_email: record.contact_email,
            payment_id: record.payment_id,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /orders: run the fulfillment steps for a new order.
#[tracing::instrument(skip(state, req))]
pub async fn place<R>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError>
where
    R: TransactionalResource + Clone + 'static,
    R::Session: RecordSession + 'static,
{
    let validated = req.into_order().and_then(|order| {
        order.validate()?;
        Ok(order)
    });
    let mut order = match validated {
        Ok(order) => order,
        Err(e) => {
            metrics::counter!("orders_rejected_total").increment(1);
            return Err(e.into());
        }
    };

    let cancel = state.shutdown.child_token();
    let report = state.orchestrator.process_request(&mut order, &cancel).await?;

    metrics::counter!("orders_placed_total").increment(1);
    tracing::info!(order_id = %order.order_id, "order placed");
    let response = OrderPlacedResponse {
        order_id: order.order_id.to_string(),
        state: report.state,
        payment_id: order.payment_confirmation,
        total_cents: order.total.cents(),
        steps: report.steps,
        duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id}: load a committed order.
#[tracing::instrument(skip(state))]
pub async fn get<R>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    R: TransactionalResource + Clone + 'static,
    R::Session: RecordSession + 'static,
{
    let order_id = RequestId::parse(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;

    let record: OrderRecord = read_record(&state.resource, ORDERS, &order_id.to_string())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))?;

    Ok(Json(record.into()))
}
