use axum::{Json, http::StatusCode, response::IntoResponse};

use aml_sdk::objects::{BlacklistAccountRequest, RiskLevel, RiskStatsResponse};

use crate::state::AppState;

use super::ApiError;

/// `POST /api/v1/blacklist/accounts`: add an account to the blacklist.
pub async fn add_to_blacklist(
    state: axum::extract::State<AppState>,
    Json(request): Json<BlacklistAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account_number = request.account_number.trim();
    if account_number.is_empty() {
        return Err(ApiError::BadRequest(
            "account_number must not be empty".to_string(),
        ));
    }
    let store = state
        .fast_store
        .as_ref()
        .ok_or(ApiError::Unavailable("fast store"))?;

    store
        .add_to_blacklist(account_number)
        .await
        .map_err(ApiError::FastStore)?;
    tracing::info!(account_number, "Account blacklisted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/stats`: completed screenings per risk level.
pub async fn risk_stats(
    state: axum::extract::State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state
        .fast_store
        .as_ref()
        .ok_or(ApiError::Unavailable("fast store"))?;

    let mut stats = RiskStatsResponse::default();
    for level in RiskLevel::ALL {
        let count = store.get_stats(level).await.map_err(ApiError::FastStore)?;
        match level {
            RiskLevel::Low => stats.low = count,
            RiskLevel::Medium => stats.medium = count,
            RiskLevel::High => stats.high = count,
        }
    }
    Ok(Json(stats))
}
