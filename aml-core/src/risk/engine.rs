//! Risk engine: gathers fast-store lookups, runs the rule table, and bumps the
//! account's daily counter.

use super::rules::{ScreeningFacts, evaluate};
use crate::cache::{CacheError, FastStore};
use aml_sdk::objects::{RiskAnalysis, Transaction};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};
use tracing::debug;

/// Errors that abort an analysis.
#[derive(Debug, Error)]
pub enum RiskError {
    /// A blacklist, country or counter lookup failed.
    #[error("fast-store lookup failed: {0}")]
    Lookup(#[source] CacheError),

    /// The post-screening counter increment failed.
    #[error("daily counter update failed: {0}")]
    CounterUpdate(#[source] CacheError),
}

/// Produces a [`RiskAnalysis`] for a transaction.
#[async_trait]
pub trait TransactionAnalyzer: Send + Sync {
    async fn analyze(&self, tx: &Transaction) -> Result<RiskAnalysis, RiskError>;
}

pub struct RiskEngine {
    store: Arc<dyn FastStore>,
}

impl RiskEngine {
    pub fn new(store: Arc<dyn FastStore>) -> Self {
        Self { store }
    }

    async fn high_risk_country(&self, tx: &Transaction) -> Result<bool, RiskError> {
        if tx.counterparty_country.is_empty() {
            return Ok(false);
        }
        self.store
            .is_high_risk_country(&tx.counterparty_country)
            .await
            .map_err(RiskError::Lookup)
    }

    async fn blacklisted_counterparty(&self, tx: &Transaction) -> Result<bool, RiskError> {
        // Blacklist entries are stored trimmed.
        let account = tx.counterparty_account.trim();
        if account.is_empty() {
            return Ok(false);
        }
        self.store
            .is_blacklisted(account)
            .await
            .map_err(RiskError::Lookup)
    }
}

#[async_trait]
impl TransactionAnalyzer for RiskEngine {
    async fn analyze(&self, tx: &Transaction) -> Result<RiskAnalysis, RiskError> {
        let high_risk_country = self.high_risk_country(tx).await?;
        let blacklisted_counterparty = self.blacklisted_counterparty(tx).await?;
        let daily_count = self
            .store
            .get_daily(&tx.account_number)
            .await
            .map_err(RiskError::Lookup)?;

        let facts = ScreeningFacts {
            tx,
            hour: tx.timestamp.to_offset(UtcOffset::UTC).hour(),
            high_risk_country,
            blacklisted_counterparty,
            daily_count,
        };
        let evaluation = evaluate(&facts);

        self.store
            .incr_daily(&tx.account_number)
            .await
            .map_err(RiskError::CounterUpdate)?;

        debug!(
            transaction_id = %tx.transaction_id,
            score = evaluation.score,
            flags = ?evaluation.flags,
            "Transaction analyzed"
        );
        Ok(RiskAnalysis::from_score(
            evaluation.score,
            evaluation.flags.into_vec(),
            OffsetDateTime::now_utc(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryFastStore;
    use crate::entities::submissions::tests::sample_transaction;
    use crate::risk::rules::CHECKS;
    use aml_sdk::objects::{Recommendation, RiskFlag, RiskLevel};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use time::macros::datetime;

    const ACCOUNT: &str = "40817810000000000001";
    const BAD_COUNTERPARTY: &str = "40817810000000000666";

    async fn engine_with_daily(daily: i64) -> (RiskEngine, Arc<InMemoryFastStore>) {
        let store = Arc::new(InMemoryFastStore::new());
        store.seed_blacklists().await.unwrap();
        store.add_to_blacklist(BAD_COUNTERPARTY).await.unwrap();
        store.set_daily(ACCOUNT, daily).await;
        (RiskEngine::new(store.clone()), store)
    }

    fn tx(amount: i64, hour: u8) -> Transaction {
        let mut tx = sample_transaction("TX");
        tx.account_number = ACCOUNT.to_string();
        tx.amount = Decimal::new(amount, 0);
        tx.timestamp = datetime!(2025-03-01 00:00 UTC) + time::Duration::hours(hour.into());
        tx
    }

    #[tokio::test]
    async fn test_low_risk_baseline() {
        let (engine, _) = engine_with_daily(2).await;
        let a = engine.analyze(&tx(100_000, 14)).await.unwrap();
        // 100 000 is a multiple of its 100 000 bucket
        assert_eq!(a.flags, vec![RiskFlag::RoundAmount]);
        assert_eq!(a.risk_score, 5);
        assert_eq!(a.risk_level, RiskLevel::Low);
        assert_eq!(a.recommendation, Recommendation::AutoApprove);

        let a = engine.analyze(&tx(123_456, 14)).await.unwrap();
        assert!(a.flags.is_empty());
        assert_eq!(a.risk_score, 0);
    }

    #[tokio::test]
    async fn test_large_amount_at_night_is_medium() {
        let (engine, _) = engine_with_daily(2).await;
        let a = engine.analyze(&tx(1_500_000, 3)).await.unwrap();
        assert_eq!(a.flags, vec![RiskFlag::LargeAmount, RiskFlag::UnusualTime]);
        assert_eq!(a.risk_score, 45);
        assert_eq!(a.risk_level, RiskLevel::Medium);
        assert_eq!(a.recommendation, Recommendation::LogOnly);
    }

    #[tokio::test]
    async fn test_very_large_offshore_is_high() {
        let (engine, _) = engine_with_daily(2).await;
        let mut t = tx(6_000_000, 14);
        t.counterparty_country = "KY".to_string();
        let a = engine.analyze(&t).await.unwrap();
        assert_eq!(
            a.flags,
            vec![
                RiskFlag::VeryLargeAmount,
                RiskFlag::OffshoreCounterparty,
                RiskFlag::RoundAmount
            ]
        );
        assert_eq!(a.risk_score, 95);
        assert_eq!(a.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_blacklisted_counterparty_is_high() {
        let (engine, _) = engine_with_daily(2).await;
        let mut t = tx(100_000, 14);
        t.counterparty_account = BAD_COUNTERPARTY.to_string();
        let a = engine.analyze(&t).await.unwrap();
        assert!(a.flags.contains(&RiskFlag::BlacklistedCounterparty));
        assert!(a.risk_score >= 100);
        assert_eq!(a.risk_level, RiskLevel::High);
        assert_eq!(a.recommendation, Recommendation::RequireVerification);
    }

    #[tokio::test]
    async fn test_padded_counterparty_matches_blacklist() {
        let (engine, _) = engine_with_daily(2).await;
        let mut t = tx(1_234, 14);
        t.counterparty_account = format!(" {BAD_COUNTERPARTY}\t");
        let a = engine.analyze(&t).await.unwrap();
        assert!(a.flags.contains(&RiskFlag::BlacklistedCounterparty));

        t.counterparty_account = "   ".to_string();
        let a = engine.analyze(&t).await.unwrap();
        assert!(!a.flags.contains(&RiskFlag::BlacklistedCounterparty));
    }

    #[tokio::test]
    async fn test_frequency_escalation() {
        let (engine, _) = engine_with_daily(10).await;
        let a = engine.analyze(&tx(1_234, 14)).await.unwrap();
        assert_eq!(a.flags, vec![RiskFlag::HighFrequency]);
        assert_eq!(a.risk_score, 25);
    }

    #[tokio::test]
    async fn test_large_atm_withdrawal() {
        let (engine, _) = engine_with_daily(2).await;
        let mut t = tx(600_000, 14);
        t.transaction_type = "withdrawal".to_string();
        t.channel = "atm".to_string();
        let a = engine.analyze(&t).await.unwrap();
        assert_eq!(
            a.flags,
            vec![
                RiskFlag::MediumAmount,
                RiskFlag::Withdrawal,
                RiskFlag::LargeAtmTransaction,
                RiskFlag::RoundAmount,
            ]
        );
        assert_eq!(a.risk_score, 10 + 5 + 12 + 5);
        assert_eq!(a.risk_level, RiskLevel::Medium);

        t.amount = Decimal::new(600_500, 0);
        let a = engine.analyze(&t).await.unwrap();
        assert_eq!(a.risk_score, 27);
        assert_eq!(a.risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn test_counter_read_before_increment() {
        let (engine, store) = engine_with_daily(4).await;
        let a = engine.analyze(&tx(1_234, 14)).await.unwrap();
        assert!(a.flags.is_empty());
        assert_eq!(store.get_daily(ACCOUNT).await.unwrap(), 5);

        let a = engine.analyze(&tx(1_234, 14)).await.unwrap();
        assert_eq!(a.flags, vec![RiskFlag::MediumFrequency]);
        assert_eq!(store.get_daily(ACCOUNT).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_empty_lookups_are_skipped() {
        let (engine, store) = engine_with_daily(0).await;
        let mut t = tx(1_234, 14);
        t.counterparty_country.clear();
        t.counterparty_account.clear();
        assert!(engine.analyze(&t).await.unwrap().flags.is_empty());
        assert_eq!(store.get_daily(ACCOUNT).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_hour_is_taken_in_utc() {
        let (engine, _) = engine_with_daily(0).await;
        let mut t = tx(1_234, 0);
        // 09:00 at +07:00 is 02:00 UTC
        t.timestamp = datetime!(2025-03-01 09:00 +7);
        let a = engine.analyze(&t).await.unwrap();
        assert_eq!(a.flags, vec![RiskFlag::UnusualTime]);
    }

    #[tokio::test]
    async fn test_lookup_failure_aborts_without_counting() {
        let (engine, store) = engine_with_daily(3).await;
        store.set_failing(true);
        let err = engine.analyze(&tx(1_234, 14)).await.unwrap_err();
        assert!(matches!(err, RiskError::Lookup(_)));
        store.set_failing(false);
        assert_eq!(store.get_daily(ACCOUNT).await.unwrap(), 3);
    }

    fn canonical_position(flag: RiskFlag) -> usize {
        CHECKS
            .iter()
            .flat_map(|c| c.rules.iter())
            .position(|r| r.flag == flag)
            .unwrap()
    }

    fn arb_transaction() -> impl Strategy<Value = Transaction> {
        (
            1i64..800_000_000,
            0u8..24,
            prop::sample::select(vec!["transfer", "international_transfer", "withdrawal"]),
            prop::sample::select(vec!["online", "mobile", "atm", "branch"]),
            prop::sample::select(vec!["RUB", "CHF", "JPY", "USD"]),
            prop::sample::select(vec!["", "RU", "KY", "PA", "DE"]),
            prop::bool::ANY,
        )
            .prop_map(|(cents, hour, ty, channel, currency, country, bad)| {
                let mut t = tx(0, hour);
                t.amount = Decimal::new(cents, 2);
                t.transaction_type = ty.to_string();
                t.channel = channel.to_string();
                t.currency = currency.to_string();
                t.counterparty_country = country.to_string();
                if bad {
                    t.counterparty_account = BAD_COUNTERPARTY.to_string();
                }
                t
            })
    }

    proptest! {
        #[test]
        fn prop_analysis_is_deterministic_and_well_formed(
            t in arb_transaction(),
            daily in 0i64..20,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let (first, second) = rt.block_on(async {
                let (a, _) = engine_with_daily(daily).await;
                let (b, _) = engine_with_daily(daily).await;
                (a.analyze(&t).await.unwrap(), b.analyze(&t).await.unwrap())
            });

            prop_assert_eq!(&first.flags, &second.flags);
            prop_assert_eq!(first.risk_score, second.risk_score);
            prop_assert_eq!(first.risk_level, RiskLevel::from_score(first.risk_score));
            prop_assert_eq!(first.recommendation, first.risk_level.recommendation());

            let positions: Vec<_> = first.flags.iter().map(|f| canonical_position(*f)).collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
