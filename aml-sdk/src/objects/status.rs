//! Status, listing and administration request/response types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::analysis::{RiskFlag, RiskLevel};
use super::transaction::SubmissionStatus;

/// Status of a single submission.
///
/// `flags` is only present when a fresh cached analysis is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatusResponse {
    pub processing_id: String,
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub analysis_timestamp: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<RiskFlag>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTransactionsResponse {
    pub transactions: Vec<TransactionStatusResponse>,
}

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

/// Query parameters for listing submissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTransactionsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Resolve a requested list limit: missing or non-positive values fall back to
/// the default, large values are capped.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(l) if l > 0 => l.min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    pub clear_storage: bool,
}

/// Request body for adding an account to the blacklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistAccountRequest {
    pub account_number: String,
}

/// Screening counters per risk level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskStatsResponse {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

/// Query parameters for republishing orphaned submissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayPendingQuery {
    /// Only submissions older than this many seconds are republished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub older_than_secs: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayPendingResponse {
    pub republished: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 100);
        assert_eq!(clamp_limit(Some(0)), 100);
        assert_eq!(clamp_limit(Some(-3)), 100);
        assert_eq!(clamp_limit(Some(25)), 25);
        assert_eq!(clamp_limit(Some(500)), 500);
        assert_eq!(clamp_limit(Some(10_000)), 500);
    }

    #[test]
    fn test_pending_status_omits_analysis_fields() {
        let status = TransactionStatusResponse {
            processing_id: "proc_1".to_string(),
            transaction_id: "TX-1".to_string(),
            amount: Some(Decimal::new(10000000, 2)),
            currency: Some("RUB".to_string()),
            status: SubmissionStatus::PendingReview,
            risk_score: None,
            risk_level: None,
            analysis_timestamp: None,
            flags: None,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "pending_review");
        assert!(value.get("risk_score").is_none());
        assert!(value.get("flags").is_none());
        assert!(value.get("analysis_timestamp").is_none());
    }
}
