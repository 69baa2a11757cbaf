//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::RequestError;
use orchestrator::OrchestratorError;
use transactor::{CoordinatorError, ResourceError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The orchestration run failed and was rolled back.
    Orchestration(OrchestratorError),
    /// A read or write outside a run failed.
    Transaction(CoordinatorError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Orchestration(err) => orchestration_error_to_response(&err),
            ApiError::Transaction(err) => {
                tracing::error!(error = %err, "transaction error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": err.to_string() }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn orchestration_error_to_response(err: &OrchestratorError) -> (StatusCode, serde_json::Value) {
    // Shutdown cancels in-flight runs
    let status = if err.is_cancelled() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = serde_json::json!({
        "error": err.primary().to_string(),
        "failed_step": err.failed_step(),
        "state": "RolledBack",
        "rollback_error": err.rollback_error().map(ToString::to_string),
    });
    (status, body)
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError::Orchestration(err)
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        ApiError::Transaction(err)
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        ApiError::Transaction(CoordinatorError::Resource(err))
    }
}
