//! Axum server setup and router configuration.

use crate::api::{ingestion_router, screening_router};
use crate::shutdown::wait_for_shutdown;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Build the ingestion service router.
pub fn build_ingestion_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .merge(ingestion_router())
        .with_state(state)
}

/// Build the fraud-detection service router.
pub fn build_screening_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(screening_router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server until `shutdown_rx` flips, then drain open connections.
pub async fn run_server(
    name: &'static str,
    router: Router,
    addr: SocketAddr,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(service = name, "Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .await?;
    tracing::info!(service = name, "Server stopped");
    Ok(())
}
