pub mod submissions;

use aml_sdk::objects::{RiskLevel as SdkRiskLevel, SubmissionStatus as SdkSubmissionStatus};

/// Submission status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `aml_sdk::objects::SubmissionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum SubmissionStatus {
    PendingReview,
    Reviewed,
}

impl From<SubmissionStatus> for SdkSubmissionStatus {
    fn from(value: SubmissionStatus) -> Self {
        match value {
            SubmissionStatus::PendingReview => SdkSubmissionStatus::PendingReview,
            SubmissionStatus::Reviewed => SdkSubmissionStatus::Reviewed,
        }
    }
}

impl From<SdkSubmissionStatus> for SubmissionStatus {
    fn from(value: SdkSubmissionStatus) -> Self {
        match value {
            SdkSubmissionStatus::PendingReview => SubmissionStatus::PendingReview,
            SdkSubmissionStatus::Reviewed => SubmissionStatus::Reviewed,
        }
    }
}

/// Risk level for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `aml_sdk::objects::RiskLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl From<RiskLevel> for SdkRiskLevel {
    fn from(value: RiskLevel) -> Self {
        match value {
            RiskLevel::Low => SdkRiskLevel::Low,
            RiskLevel::Medium => SdkRiskLevel::Medium,
            RiskLevel::High => SdkRiskLevel::High,
        }
    }
}

impl From<SdkRiskLevel> for RiskLevel {
    fn from(value: SdkRiskLevel) -> Self {
        match value {
            SdkRiskLevel::Low => RiskLevel::Low,
            SdkRiskLevel::Medium => RiskLevel::Medium,
            SdkRiskLevel::High => RiskLevel::High,
        }
    }
}
