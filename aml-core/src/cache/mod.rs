//! Fast store: cached analyses, blacklist sets and rolling counters.
//!
//! [`RedisFastStore`] is the production backend. [`InMemoryFastStore`] keeps
//! the same key layout and TTL semantics in process, for tests and local
//! runs without Redis.

pub mod keys;
pub mod memory;
pub mod redis;

pub use self::memory::InMemoryFastStore;
pub use self::redis::RedisFastStore;

use aml_sdk::objects::{RiskAnalysis, RiskLevel};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to the fast store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("fast store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait FastStore: Send + Sync {
    /// Cache an analysis under its processing id for [`keys::ANALYSIS_TTL`].
    async fn put_analysis(
        &self,
        processing_id: &str,
        analysis: &RiskAnalysis,
    ) -> Result<(), CacheError>;

    /// The cached analysis, if it has not expired.
    async fn get_analysis(&self, processing_id: &str) -> Result<Option<RiskAnalysis>, CacheError>;

    async fn incr_stats(&self, level: RiskLevel) -> Result<(), CacheError>;

    /// Screenings completed at `level`; 0 if none.
    async fn get_stats(&self, level: RiskLevel) -> Result<i64, CacheError>;

    /// Increment the account's daily counter and renew its TTL in one atomic
    /// step. Returns the new value.
    async fn incr_daily(&self, account_number: &str) -> Result<i64, CacheError>;

    /// The account's daily counter; 0 if absent.
    async fn get_daily(&self, account_number: &str) -> Result<i64, CacheError>;

    async fn is_blacklisted(&self, account_number: &str) -> Result<bool, CacheError>;

    async fn is_high_risk_country(&self, country_code: &str) -> Result<bool, CacheError>;

    async fn add_to_blacklist(&self, account_number: &str) -> Result<(), CacheError>;

    /// Populate the high-risk country set. Idempotent.
    async fn seed_blacklists(&self) -> Result<(), CacheError>;

    /// Remove cached analyses, stats and daily counters. Blacklist sets are
    /// kept. Returns the number of keys removed.
    async fn clear_transaction_data(&self) -> Result<u64, CacheError>;
}
