mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::config::ServerConfig;
use crate::contracts::{CertificateStore, CounterStore};

pub use handlers::{
    ApiError, AppState, CreateCertificateResponse, ErrorResponse, GetCertificateResponse,
    ListCertificatesResponse, StatsResponse,
};

/// Creates the API router.
pub fn create_router<S>(state: Arc<AppState<S>>) -> Router
where
    S: CounterStore + CertificateStore + 'static,
{
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/health/ready", get(handlers::health_ready::<S>))
        .route("/stats", get(handlers::get_stats::<S>))
        .route("/metrics", get(handlers::metrics::<S>))
        .route("/counters", get(handlers::list_counters::<S>))
        .route(
            "/certificates",
            post(handlers::create_certificate::<S>).get(handlers::list_certificates::<S>),
        )
        .route(
            "/certificates/:certificate_id",
            get(handlers::get_certificate::<S>),
        )
        .with_state(state)
}

/// Starts the HTTP server and runs until `shutdown` resolves.
pub async fn start_server<S, F>(
    config: ServerConfig,
    state: Arc<AppState<S>>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: CounterStore + CertificateStore + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
