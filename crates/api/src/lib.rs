//! HTTP API server for the atomic order orchestrator.
//!
//! Places orders by running the fulfillment steps inside one transaction,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::OrderRequest;
use fulfillment::{Notifier, PaymentGateway, standard_steps};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{CancellationToken, Orchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use transactor::{RecordSession, TransactionalResource};

/// Shared application state accessible from all handlers.
pub struct AppState<R: TransactionalResource> {
    /// Runs the fulfillment steps for each placed order.
    pub orchestrator: Orchestrator<R, OrderRequest>,
    /// Resource used for reads and stock updates outside a run.
    pub resource: R,
    /// Cancelled on shutdown; every run observes a child of it.
    pub shutdown: CancellationToken,
}

/// Creates the application state with the standard fulfillment steps.
pub fn create_state<R, P, N>(resource: R, gateway: P, notifier: N) -> Arc<AppState<R>>
where
    R: TransactionalResource + Clone + 'static,
    R::Session: RecordSession + 'static,
    P: PaymentGateway + 'static,
    N: Notifier + 'static,
{
    let orchestrator = Orchestrator::new(resource.clone(), standard_steps(gateway, notifier));
    Arc::new(AppState {
        orchestrator,
        resource,
        shutdown: CancellationToken::new(),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R>(state: Arc<AppState<R>>, metrics_handle: PrometheusHandle) -> Router
where
    R: TransactionalResource + Clone + 'static,
    R::Session: RecordSession + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<R>))
        .route("/orders", post(routes::orders::place::<R>))
        .route("/orders/{id}", get(routes::orders::get::<R>))
        .route(
            "/inventory/{sku}",
            get(routes::inventory::get::<R>).put(routes::inventory::set::<R>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
