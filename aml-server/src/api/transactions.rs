use axum::{
    Json,
    extract::{Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use kanau::processor::Processor;

use aml_core::entities::submissions::{
    ClearSubmissions, GetSubmission, ListSubmissions, SubmissionRecord,
};
use aml_core::framework::DatabaseProcessor;
use aml_sdk::objects::{
    ClearResponse, ListTransactionsQuery, ListTransactionsResponse, ReplayPendingQuery,
    ReplayPendingResponse, RiskFlag, TransactionPayload, TransactionStatusResponse, clamp_limit,
};

use crate::state::AppState;

use super::ApiError;

/// Submissions younger than this are assumed to still be in flight.
const DEFAULT_REPLAY_AGE_SECS: i64 = 60;

pub(crate) fn status_response(
    record: &SubmissionRecord,
    flags: Option<Vec<RiskFlag>>,
) -> TransactionStatusResponse {
    let tx = &record.transaction;
    TransactionStatusResponse {
        processing_id: record.processing_id.clone(),
        transaction_id: tx.transaction_id.clone(),
        amount: Some(tx.amount),
        currency: (!tx.currency.is_empty()).then(|| tx.currency.clone()),
        status: record.status.into(),
        risk_score: record.risk_score,
        risk_level: record.risk_level.map(Into::into),
        analysis_timestamp: record.analysis_timestamp,
        flags,
    }
}

/// `POST /api/v1/transactions`: accept a transaction for screening.
pub async fn submit_transaction(
    state: axum::extract::State<AppState>,
    payload: Result<Json<TransactionPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let ingestion = state
        .ingestion
        .as_ref()
        .ok_or(ApiError::Unavailable("ingestion"))?;

    let response = ingestion.process(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/v1/transactions`: most recent submissions first.
pub async fn list_transactions(
    state: axum::extract::State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    let records = processor
        .process(ListSubmissions {
            limit: clamp_limit(query.limit),
        })
        .await
        .map_err(ApiError::Database)?;

    let transactions = records.iter().map(|r| status_response(r, None)).collect();
    Ok(Json(ListTransactionsResponse { transactions }))
}

/// `GET /api/v1/transactions/{processing_id}`: status of one submission.
///
/// Flags come from the cached analysis and are omitted once it expires or
/// when this service has no fast store.
pub async fn get_transaction_status(
    state: axum::extract::State<AppState>,
    Path(processing_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    let record = processor
        .process(GetSubmission {
            processing_id: processing_id.clone(),
        })
        .await
        .map_err(ApiError::Database)?
        .ok_or(ApiError::NotFound)?;

    let flags = match &state.fast_store {
        Some(store) => match store.get_analysis(&processing_id).await {
            Ok(cached) => cached.map(|a| a.flags),
            Err(e) => {
                tracing::warn!(
                    processing_id = %processing_id,
                    error = %e,
                    "Failed to read cached analysis"
                );
                None
            }
        },
        None => None,
    };

    Ok(Json(status_response(&record, flags)))
}

/// `DELETE /api/v1/transactions`: drop every submission.
///
/// On the fraud-detection service this also drops cached analyses, stats and
/// daily counters. Blacklists are kept. A fast store failure is logged and
/// does not fail the request.
pub async fn clear_transactions(
    state: axum::extract::State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    let submissions = processor
        .process(ClearSubmissions)
        .await
        .map_err(ApiError::Database)?;

    // Rows are already gone, so a cache failure only leaves stale entries
    // that expire on their own.
    let cached_keys = match &state.fast_store {
        Some(store) => match store.clear_transaction_data().await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to clear cached transaction data");
                0
            }
        },
        None => 0,
    };

    tracing::info!(submissions, cached_keys, "Transactions cleared");
    Ok(Json(ClearResponse {
        message: "All transactions cleared successfully".to_string(),
        clear_storage: true,
    }))
}

/// `POST /api/v1/transactions/replay-pending`: republish jobs for
/// submissions stuck in `pending_review`.
pub async fn replay_pending(
    state: axum::extract::State<AppState>,
    Query(query): Query<ReplayPendingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ingestion = state
        .ingestion
        .as_ref()
        .ok_or(ApiError::Unavailable("ingestion"))?;

    let older_than_secs = query.older_than_secs.unwrap_or(DEFAULT_REPLAY_AGE_SECS);
    if older_than_secs < 0 {
        return Err(ApiError::BadRequest(
            "older_than_secs must not be negative".to_string(),
        ));
    }

    let republished = ingestion
        .republish_pending(
            time::Duration::seconds(older_than_secs),
            clamp_limit(query.limit),
        )
        .await?;
    Ok(Json(ReplayPendingResponse { republished }))
}
