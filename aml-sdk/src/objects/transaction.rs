//! Transaction submission types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

/// A retail bank transaction as it is screened by the pipeline.
///
/// Immutable once submitted. Optional counterparty and origin fields are
/// carried as empty strings when the caller leaves them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_number: String,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_type: String,
    #[serde(default)]
    pub counterparty_account: String,
    #[serde(default)]
    pub counterparty_bank: String,
    /// ISO-3166-1 alpha-2 code, empty when unknown.
    #[serde(default)]
    pub counterparty_country: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub branch_id: String,
}

/// Request body for submitting a transaction for screening.
///
/// Identical to [`Transaction`] except that `timestamp` may be omitted, in
/// which case the ingestion service stamps the time of receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub transaction_id: String,
    pub account_number: String,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_type: String,
    #[serde(default)]
    pub counterparty_account: String,
    #[serde(default)]
    pub counterparty_bank: String,
    #[serde(default)]
    pub counterparty_country: String,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub branch_id: String,
}

/// Reasons a [`TransactionPayload`] is rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),
}

impl TransactionPayload {
    /// Check the fields the pipeline cannot work without.
    pub fn validate(&self) -> Result<(), PayloadError> {
        let required = [
            ("transaction_id", &self.transaction_id),
            ("account_number", &self.account_number),
            ("currency", &self.currency),
            ("transaction_type", &self.transaction_type),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(PayloadError::EmptyField(*name));
        }
        if self.amount <= Decimal::ZERO {
            return Err(PayloadError::NonPositiveAmount(self.amount));
        }
        Ok(())
    }

    /// Turn the payload into a [`Transaction`], defaulting the timestamp to
    /// `received_at` and normalising it to UTC.
    pub fn into_transaction(self, received_at: OffsetDateTime) -> Transaction {
        let timestamp = self.timestamp.unwrap_or(received_at).to_offset(UtcOffset::UTC);
        Transaction {
            transaction_id: self.transaction_id,
            account_number: self.account_number,
            amount: self.amount,
            currency: self.currency,
            transaction_type: self.transaction_type,
            counterparty_account: self.counterparty_account,
            counterparty_bank: self.counterparty_bank,
            counterparty_country: self.counterparty_country,
            timestamp,
            channel: self.channel,
            user_id: self.user_id,
            branch_id: self.branch_id,
        }
    }
}

/// Screening status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    PendingReview,
    Reviewed,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionStatus::PendingReview => write!(f, "pending_review"),
            SubmissionStatus::Reviewed => write!(f, "reviewed"),
        }
    }
}

/// Response returned once a transaction has been accepted for screening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResponse {
    pub processing_id: String,
    pub status: SubmissionStatus,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn payload() -> TransactionPayload {
        serde_json::from_str(
            r#"{
                "transaction_id": "TX-1",
                "account_number": "40817810000000000001",
                "amount": "1500000.50",
                "currency": "RUB",
                "transaction_type": "transfer",
                "counterparty_country": "RU",
                "timestamp": "2025-03-01T03:15:00+03:00",
                "channel": "online"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_payload_parses_with_optional_fields_missing() {
        let p = payload();
        assert_eq!(p.amount, Decimal::new(150000050, 2));
        assert!(p.counterparty_account.is_empty());
        assert!(p.user_id.is_empty());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_into_transaction_normalises_to_utc() {
        let tx = payload().into_transaction(datetime!(2025-03-02 10:00 UTC));
        assert_eq!(tx.timestamp, datetime!(2025-03-01 00:15 UTC));
        assert_eq!(tx.timestamp.offset(), UtcOffset::UTC);
    }

    #[test]
    fn test_missing_timestamp_defaults_to_receipt_time() {
        let mut p = payload();
        p.timestamp = None;
        let tx = p.into_transaction(datetime!(2025-03-02 10:00 UTC));
        assert_eq!(tx.timestamp, datetime!(2025-03-02 10:00 UTC));
    }

    #[test]
    fn test_validation_rejects_bad_payloads() {
        let mut p = payload();
        p.amount = Decimal::ZERO;
        assert_eq!(
            p.validate(),
            Err(PayloadError::NonPositiveAmount(Decimal::ZERO))
        );

        let mut p = payload();
        p.currency = "  ".to_string();
        assert_eq!(p.validate(), Err(PayloadError::EmptyField("currency")));

        let mut p = payload();
        p.transaction_id.clear();
        assert_eq!(p.validate(), Err(PayloadError::EmptyField("transaction_id")));
    }

    #[test]
    fn test_numeric_amount_keeps_its_scale() {
        let p: TransactionPayload = serde_json::from_str(
            r#"{
                "transaction_id": "TX-2",
                "account_number": "40817810000000000001",
                "amount": 1500000.50,
                "currency": "RUB",
                "transaction_type": "transfer"
            }"#,
        )
        .unwrap();
        assert_eq!(p.amount.to_string(), "1500000.50");

        let tx = p.into_transaction(datetime!(2025-03-02 10:00 UTC));
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["amount"], "1500000.50");

        let small: TransactionPayload = serde_json::from_str(
            r#"{"transaction_id":"TX-3","account_number":"1","amount":100.10,
                "currency":"USD","transaction_type":"transfer"}"#,
        )
        .unwrap();
        assert_eq!(small.amount.to_string(), "100.10");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SubmissionStatus::PendingReview).unwrap();
        assert_eq!(json, "\"pending_review\"");
        assert_eq!(SubmissionStatus::Reviewed.to_string(), "reviewed");
    }
}
