//! HTTP API handlers.
//!
//! # Ingestion service
//!
//! - `POST   /api/v1/transactions`                  submit a transaction
//! - `GET    /api/v1/transactions`                  list recent submissions
//! - `GET    /api/v1/transactions/{processing_id}`  submission status
//! - `DELETE /api/v1/transactions`                  drop all submissions
//! - `POST   /api/v1/transactions/replay-pending`   republish orphaned jobs
//!
//! # Fraud-detection service
//!
//! - `GET    /api/v1/transactions/{processing_id}`  status with flags
//! - `DELETE /api/v1/transactions`                  drop submissions and cached data
//! - `POST   /api/v1/blacklist/accounts`            blacklist an account
//! - `GET    /api/v1/stats`                         screenings per risk level

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use aml_core::cache::CacheError;
use aml_core::processors::IngestError;

use crate::state::AppState;

mod admin;
mod transactions;

/// Build the ingestion service API router.
pub fn ingestion_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/transactions",
            post(transactions::submit_transaction)
                .get(transactions::list_transactions)
                .delete(transactions::clear_transactions),
        )
        .route(
            "/api/v1/transactions/replay-pending",
            post(transactions::replay_pending),
        )
        .route(
            "/api/v1/transactions/{processing_id}",
            get(transactions::get_transaction_status),
        )
}

/// Build the fraud-detection service API router.
pub fn screening_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/transactions",
            axum::routing::delete(transactions::clear_transactions),
        )
        .route(
            "/api/v1/transactions/{processing_id}",
            get(transactions::get_transaction_status),
        )
        .route("/api/v1/blacklist/accounts", post(admin::add_to_blacklist))
        .route("/api/v1/stats", get(admin::risk_stats))
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in API handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound,
    Ingest(IngestError),
    Database(sqlx::Error),
    FastStore(CacheError),
    /// The handler's dependency is not wired into this service.
    Unavailable(&'static str),
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        ApiError::Ingest(e)
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::BadRequest(message) => error_body(StatusCode::BAD_REQUEST, message),
            ApiError::NotFound => error_body(StatusCode::NOT_FOUND, "Transaction not found"),
            ApiError::Ingest(IngestError::Validation(e)) => {
                error_body(StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Ingest(e) => {
                tracing::error!(error = %e, "Failed to ingest transaction");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process transaction",
                )
            }
            ApiError::Database(e) => {
                tracing::error!(error = %e, "API database error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            ApiError::FastStore(e) => {
                tracing::error!(error = %e, "API fast store error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            ApiError::Unavailable(what) => {
                tracing::error!(dependency = what, "API dependency not configured");
                error_body(StatusCode::SERVICE_UNAVAILABLE, format!("{what} is not available"))
            }
        }
    }
}
