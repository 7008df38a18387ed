//! Key layout of the fast store.

use aml_sdk::objects::RiskLevel;
use std::time::Duration;

pub const BLACKLIST_ACCOUNTS: &str = "blacklist:accounts";
pub const HIGH_RISK_COUNTRIES: &str = "high_risk_countries";

/// Lifetime of a cached analysis.
pub const ANALYSIS_TTL: Duration = Duration::from_secs(60 * 60);
/// Lifetime of a per-account daily counter, renewed on every increment.
pub const DAILY_COUNTER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Countries seeded into [`HIGH_RISK_COUNTRIES`] at startup.
pub const SEED_HIGH_RISK_COUNTRIES: [&str; 6] = ["VG", "KY", "BS", "PA", "SC", "MU"];

/// Key prefixes dropped when transaction data is cleared. Blacklist sets are
/// not among them.
pub const CLEARABLE_PREFIXES: [&str; 3] = ["transaction:", "risk_stats:", "limits:account:"];

pub fn analysis(processing_id: &str) -> String {
    format!("transaction:{processing_id}:analysis")
}

pub fn risk_stats(level: RiskLevel) -> String {
    format!("risk_stats:{level}")
}

pub fn daily_count(account_number: &str) -> String {
    format!("limits:account:{account_number}:daily:count")
}
