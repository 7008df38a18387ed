//! Redis-backed fast store.
//!
//! Uses the async `ConnectionManager`, which reconnects on its own and is
//! cheap to clone per call.

use super::{CacheError, FastStore, keys};
use aml_sdk::objects::{RiskAnalysis, RiskLevel};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::{debug, info};

const SCAN_BATCH: usize = 500;

#[derive(Clone)]
pub struct RedisFastStore {
    manager: ConnectionManager,
}

impl RedisFastStore {
    /// Connect to Redis at `url` (e.g. `redis://:secret@localhost:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    /// Delete every key matching `pattern`, walking the keyspace with SCAN.
    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        let mut removed = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !batch.is_empty() {
                let n: u64 = conn.del(&batch).await?;
                removed += n;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        debug!(pattern, removed, "Cleared fast-store keys");
        Ok(removed)
    }
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn put_analysis(
        &self,
        processing_id: &str,
        analysis: &RiskAnalysis,
    ) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(analysis)?;
        let _: () = conn
            .set_ex(
                keys::analysis(processing_id),
                payload,
                keys::ANALYSIS_TTL.as_secs(),
            )
            .await?;
        Ok(())
    }

    async fn get_analysis(&self, processing_id: &str) -> Result<Option<RiskAnalysis>, CacheError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(keys::analysis(processing_id)).await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(CacheError::from)
    }

    async fn incr_stats(&self, level: RiskLevel) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.incr(keys::risk_stats(level), 1).await?;
        Ok(())
    }

    async fn get_stats(&self, level: RiskLevel) -> Result<i64, CacheError> {
        let mut conn = self.manager.clone();
        let count: Option<i64> = conn.get(keys::risk_stats(level)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn incr_daily(&self, account_number: &str) -> Result<i64, CacheError> {
        let mut conn = self.manager.clone();
        let key = keys::daily_count(account_number);
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, keys::DAILY_COUNTER_TTL.as_secs() as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn get_daily(&self, account_number: &str) -> Result<i64, CacheError> {
        let mut conn = self.manager.clone();
        let count: Option<i64> = conn.get(keys::daily_count(account_number)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn is_blacklisted(&self, account_number: &str) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        Ok(conn
            .sismember(keys::BLACKLIST_ACCOUNTS, account_number)
            .await?)
    }

    async fn is_high_risk_country(&self, country_code: &str) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        Ok(conn
            .sismember(keys::HIGH_RISK_COUNTRIES, country_code)
            .await?)
    }

    async fn add_to_blacklist(&self, account_number: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.sadd(keys::BLACKLIST_ACCOUNTS, account_number).await?;
        Ok(())
    }

    async fn seed_blacklists(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let added: i64 = conn
            .sadd(keys::HIGH_RISK_COUNTRIES, &keys::SEED_HIGH_RISK_COUNTRIES[..])
            .await?;
        info!(added, "Seeded high-risk countries");
        Ok(())
    }

    async fn clear_transaction_data(&self) -> Result<u64, CacheError> {
        let mut removed = 0;
        for prefix in keys::CLEARABLE_PREFIXES {
            removed += self.delete_matching(&format!("{prefix}*")).await?;
        }
        Ok(removed)
    }
}
