//! Risk analysis types produced by the scoring engine.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Highest score still considered low risk.
pub const LOW_RISK_MAX_SCORE: u32 = 30;
/// Highest score still considered medium risk.
pub const MEDIUM_RISK_MAX_SCORE: u32 = 70;

/// Coarse risk bucket derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    /// Map a final score onto its level.
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s <= LOW_RISK_MAX_SCORE => RiskLevel::Low,
            s if s <= MEDIUM_RISK_MAX_SCORE => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// The action hint attached to this level.
    pub fn recommendation(&self) -> Recommendation {
        match self {
            RiskLevel::Low => Recommendation::AutoApprove,
            RiskLevel::Medium => Recommendation::LogOnly,
            RiskLevel::High => Recommendation::RequireVerification,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action hint for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    AutoApprove,
    LogOnly,
    RequireVerification,
}

/// Machine-readable tag explaining part of a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    VeryLargeAmount,
    LargeAmount,
    MediumAmount,
    OffshoreCounterparty,
    BlacklistedCounterparty,
    UnusualTime,
    LateHours,
    HighFrequency,
    MediumFrequency,
    InternationalTransfer,
    Withdrawal,
    LargeAtmTransaction,
    AtmTransaction,
    LargeMobileTransaction,
    HighRiskCurrency,
    RoundAmount,
}

impl RiskFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFlag::VeryLargeAmount => "very_large_amount",
            RiskFlag::LargeAmount => "large_amount",
            RiskFlag::MediumAmount => "medium_amount",
            RiskFlag::OffshoreCounterparty => "offshore_counterparty",
            RiskFlag::BlacklistedCounterparty => "blacklisted_counterparty",
            RiskFlag::UnusualTime => "unusual_time",
            RiskFlag::LateHours => "late_hours",
            RiskFlag::HighFrequency => "high_frequency",
            RiskFlag::MediumFrequency => "medium_frequency",
            RiskFlag::InternationalTransfer => "international_transfer",
            RiskFlag::Withdrawal => "withdrawal",
            RiskFlag::LargeAtmTransaction => "large_atm_transaction",
            RiskFlag::AtmTransaction => "atm_transaction",
            RiskFlag::LargeMobileTransaction => "large_mobile_transaction",
            RiskFlag::HighRiskCurrency => "high_risk_currency",
            RiskFlag::RoundAmount => "round_amount",
        }
    }
}

impl std::fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of screening one transaction.
///
/// `flags` are in the order the checks fired and never repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub flags: Vec<RiskFlag>,
    pub recommendation: Recommendation,
    #[serde(with = "time::serde::rfc3339")]
    pub analyzed_at: OffsetDateTime,
}

impl RiskAnalysis {
    /// Build an analysis from a final score, deriving level and recommendation.
    pub fn from_score(risk_score: u32, flags: Vec<RiskFlag>, analyzed_at: OffsetDateTime) -> Self {
        let risk_level = RiskLevel::from_score(risk_score);
        Self {
            risk_score,
            risk_level,
            flags,
            recommendation: risk_level.recommendation(),
            analyzed_at,
        }
    }
}
