//! In-process fast store with the same key layout and TTL semantics as Redis.

use super::{CacheError, FastStore, keys};
use aml_sdk::objects::{RiskAnalysis, RiskLevel};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Counter(i64),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct InMemoryFastStore {
    entries: Mutex<HashMap<String, Entry>>,
    failing: AtomicBool,
}

impl InMemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with [`CacheError::Unavailable`]
    /// until switched back off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Set an account's daily counter directly.
    pub async fn set_daily(&self, account_number: &str, count: i64) {
        self.entries.lock().await.insert(
            keys::daily_count(account_number),
            Entry {
                value: Value::Counter(count),
                expires_at: Some(Instant::now() + keys::DAILY_COUNTER_TTL),
            },
        );
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("in-memory store switched off".into()));
        }
        Ok(())
    }

    async fn live_value(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at.is_some_and(|at| at <= Instant::now()) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    async fn counter(&self, key: &str) -> i64 {
        match self.live_value(key).await {
            Some(Value::Counter(n)) => n,
            _ => 0,
        }
    }

    async fn increment(&self, key: String, ttl: Option<Duration>) -> i64 {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let current = match entries.get(&key) {
            Some(Entry {
                value: Value::Counter(n),
                expires_at,
            }) if !expires_at.is_some_and(|at| at <= now) => *n,
            _ => 0,
        };
        let next = current + 1;
        let expires_at = match ttl {
            Some(ttl) => Some(now + ttl),
            None => entries.get(&key).and_then(|e| e.expires_at),
        };
        entries.insert(
            key,
            Entry {
                value: Value::Counter(next),
                expires_at,
            },
        );
        next
    }

    async fn set_contains(&self, key: &str, member: &str) -> bool {
        matches!(self.live_value(key).await, Some(Value::Set(set)) if set.contains(member))
    }

    async fn set_add(&self, key: &str, members: &[&str]) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        });
        if let Value::Set(set) = &mut entry.value {
            set.extend(members.iter().map(|m| m.to_string()));
        } else {
            entry.value = Value::Set(members.iter().map(|m| m.to_string()).collect());
        }
    }
}

#[async_trait]
impl FastStore for InMemoryFastStore {
    async fn put_analysis(
        &self,
        processing_id: &str,
        analysis: &RiskAnalysis,
    ) -> Result<(), CacheError> {
        self.check_available()?;
        let payload = serde_json::to_string(analysis)?;
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| !entry.expires_at.is_some_and(|at| at <= now));
        entries.insert(
            keys::analysis(processing_id),
            Entry {
                value: Value::Text(payload),
                expires_at: Some(now + keys::ANALYSIS_TTL),
            },
        );
        Ok(())
    }

    async fn get_analysis(&self, processing_id: &str) -> Result<Option<RiskAnalysis>, CacheError> {
        self.check_available()?;
        match self.live_value(&keys::analysis(processing_id)).await {
            Some(Value::Text(raw)) => Ok(Some(serde_json::from_str(&raw)?)),
            _ => Ok(None),
        }
    }

    async fn incr_stats(&self, level: RiskLevel) -> Result<(), CacheError> {
        self.check_available()?;
        self.increment(keys::risk_stats(level), None).await;
        Ok(())
    }

    async fn get_stats(&self, level: RiskLevel) -> Result<i64, CacheError> {
        self.check_available()?;
        Ok(self.counter(&keys::risk_stats(level)).await)
    }

    async fn incr_daily(&self, account_number: &str) -> Result<i64, CacheError> {
        self.check_available()?;
        Ok(self
            .increment(
                keys::daily_count(account_number),
                Some(keys::DAILY_COUNTER_TTL),
            )
            .await)
    }

    async fn get_daily(&self, account_number: &str) -> Result<i64, CacheError> {
        self.check_available()?;
        Ok(self.counter(&keys::daily_count(account_number)).await)
    }

    async fn is_blacklisted(&self, account_number: &str) -> Result<bool, CacheError> {
        self.check_available()?;
        Ok(self
            .set_contains(keys::BLACKLIST_ACCOUNTS, account_number)
            .await)
    }

    async fn is_high_risk_country(&self, country_code: &str) -> Result<bool, CacheError> {
        self.check_available()?;
        Ok(self
            .set_contains(keys::HIGH_RISK_COUNTRIES, country_code)
            .await)
    }

    async fn add_to_blacklist(&self, account_number: &str) -> Result<(), CacheError> {
        self.check_available()?;
        self.set_add(keys::BLACKLIST_ACCOUNTS, &[account_number])
            .await;
        Ok(())
    }

    async fn seed_blacklists(&self) -> Result<(), CacheError> {
        self.check_available()?;
        self.set_add(keys::HIGH_RISK_COUNTRIES, &keys::SEED_HIGH_RISK_COUNTRIES)
            .await;
        Ok(())
    }

    async fn clear_transaction_data(&self) -> Result<u64, CacheError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| {
            !keys::CLEARABLE_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
        });
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aml_sdk::objects::RiskFlag;
    use time::macros::datetime;

    fn analysis() -> RiskAnalysis {
        RiskAnalysis::from_score(
            45,
            vec![RiskFlag::LargeAmount, RiskFlag::UnusualTime],
            datetime!(2025-03-01 03:16 UTC),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_analysis_expires_after_an_hour() {
        let store = InMemoryFastStore::new();
        store.put_analysis("proc_1", &analysis()).await.unwrap();

        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        assert_eq!(store.get_analysis("proc_1").await.unwrap(), Some(analysis()));

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert_eq!(store.get_analysis("proc_1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_purged_on_write() {
        let store = InMemoryFastStore::new();
        for pid in ["proc_1", "proc_2", "proc_3"] {
            store.put_analysis(pid, &analysis()).await.unwrap();
        }
        store.incr_daily("acct").await.unwrap();
        store.add_to_blacklist("bad-acct").await.unwrap();

        tokio::time::advance(Duration::from_secs(2 * 3600)).await;
        store.put_analysis("proc_4", &analysis()).await.unwrap();

        let entries = store.entries.lock().await;
        assert!(!entries.contains_key(&keys::analysis("proc_1")));
        assert!(entries.contains_key(&keys::analysis("proc_4")));
        assert!(entries.contains_key(&keys::daily_count("acct")));
        assert!(entries.contains_key(keys::BLACKLIST_ACCOUNTS));
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_counter_ttl_renews_on_increment() {
        let store = InMemoryFastStore::new();
        assert_eq!(store.get_daily("acct").await.unwrap(), 0);
        assert_eq!(store.incr_daily("acct").await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(23 * 3600)).await;
        assert_eq!(store.incr_daily("acct").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(23 * 3600)).await;
        assert_eq!(store.get_daily("acct").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(2 * 3600)).await;
        assert_eq!(store.get_daily("acct").await.unwrap(), 0);
        assert_eq!(store.incr_daily("acct").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent_and_accounts_not_seeded() {
        let store = InMemoryFastStore::new();
        store.seed_blacklists().await.unwrap();
        store.seed_blacklists().await.unwrap();
        for code in keys::SEED_HIGH_RISK_COUNTRIES {
            assert!(store.is_high_risk_country(code).await.unwrap());
        }
        assert!(!store.is_high_risk_country("RU").await.unwrap());
        assert!(!store.is_blacklisted("40817810000000000099").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_keeps_blacklists() {
        let store = InMemoryFastStore::new();
        store.seed_blacklists().await.unwrap();
        store.add_to_blacklist("bad-acct").await.unwrap();
        store.put_analysis("proc_1", &analysis()).await.unwrap();
        store.incr_stats(RiskLevel::Medium).await.unwrap();
        store.incr_daily("acct").await.unwrap();

        assert_eq!(store.clear_transaction_data().await.unwrap(), 3);
        assert_eq!(store.get_analysis("proc_1").await.unwrap(), None);
        assert_eq!(store.get_stats(RiskLevel::Medium).await.unwrap(), 0);
        assert_eq!(store.get_daily("acct").await.unwrap(), 0);
        assert!(store.is_blacklisted("bad-acct").await.unwrap());
        assert!(store.is_high_risk_country("KY").await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_switch() {
        let store = InMemoryFastStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.get_daily("acct").await,
            Err(CacheError::Unavailable(_))
        ));
        store.set_failing(false);
        assert_eq!(store.get_daily("acct").await.unwrap(), 0);
    }
}
