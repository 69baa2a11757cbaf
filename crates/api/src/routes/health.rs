//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use transactor::{TransactionCoordinator, TransactionalResource};

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health: opens and rolls back a session to probe the resource.
pub async fn check<R>(
    State(state): State<Arc<AppState<R>>>,
) -> (StatusCode, Json<HealthResponse>)
where
    R: TransactionalResource + Clone + 'static,
{
    let mut coordinator = TransactionCoordinator::new(state.resource.clone());
    let probe = match coordinator.begin().await {
        Ok(()) => coordinator.release().await,
        Err(e) => Err(e),
    };

    match probe {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
