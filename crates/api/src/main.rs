//! API server entry point.

use api::config::{Config, LogFormat};
use fulfillment::{InMemoryNotifier, InMemoryPaymentGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::CancellationToken;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use transactor::{InMemoryResource, PostgresResource};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM), then cancels in-flight runs.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
    shutdown.cancel();
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_app(
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> (axum::Router, CancellationToken) {
    let gateway = InMemoryPaymentGateway::new();
    let notifier = InMemoryNotifier::new();

    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to Postgres");
            let resource = PostgresResource::new(pool);
            resource
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!(
                max_connections = config.database_max_connections,
                "using Postgres resource"
            );

            let state = api::create_state(resource, gateway, notifier);
            let shutdown = state.shutdown.clone();
            (api::create_app(state, metrics_handle), shutdown)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory resource");
            let state = api::create_state(InMemoryResource::new(), gateway, notifier);
            let shutdown = state.shutdown.clone();
            (api::create_app(state, metrics_handle), shutdown)
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Select the transactional resource and build the application
    let (app, shutdown) = build_app(&config, metrics_handle).await;

    // 4. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
