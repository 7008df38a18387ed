//! ScoringWorker processor.
//!
//! The ScoringWorker is responsible for:
//! - Pulling `JobEvent` deliveries from a [`JobSource`]
//! - Loading the full transaction from the primary store
//! - Running the risk engine
//! - Caching the analysis and recording it on the submission
//! - Committing the delivery, or handing it back for redelivery on failure
//!
//! The primary-store update is the only step whose failure is fatal for a
//! job. Cache and statistics writes are logged and skipped.

use crate::cache::FastStore;
use crate::entities::submissions::{GetFullTransaction, UpdateSubmissionAnalysis};
use crate::events::{Delivery, JobSource};
use crate::framework::DatabaseProcessor;
use crate::risk::{RiskError, TransactionAnalyzer};
use crate::utils::lock_retry::RetryPolicy;
use aml_sdk::objects::RiskAnalysis;
use kanau::processor::Processor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pause before pulling again after a failed job.
pub const FAILURE_BACKOFF: Duration = Duration::from_secs(1);

/// Errors that leave a job uncommitted.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("analysis failed: {0}")]
    Analysis(#[from] RiskError),

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),
}

/// What became of a single delivery.
#[derive(Debug)]
pub enum ScreeningOutcome {
    /// The submission is now `reviewed`.
    Reviewed {
        processing_id: String,
        analysis: RiskAnalysis,
    },
    /// The payload could not be decoded.
    Poison,
    /// No submission matches the event, or it was cleared mid-flight.
    NotFound { processing_id: String },
}

#[derive(Clone)]
pub struct ScoringWorker {
    db: DatabaseProcessor,
    analyzer: Arc<dyn TransactionAnalyzer>,
    fast_store: Arc<dyn FastStore>,
    lookup_retry: RetryPolicy,
    failure_backoff: Duration,
}

impl ScoringWorker {
    pub fn new(
        db: DatabaseProcessor,
        analyzer: Arc<dyn TransactionAnalyzer>,
        fast_store: Arc<dyn FastStore>,
    ) -> Self {
        Self {
            db,
            analyzer,
            fast_store,
            lookup_retry: RetryPolicy::PRIMARY_STORE,
            failure_backoff: FAILURE_BACKOFF,
        }
    }

    pub fn with_lookup_retry(mut self, retry: RetryPolicy) -> Self {
        self.lookup_retry = retry;
        self
    }

    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// Run until shutdown is signalled or the source closes.
    ///
    /// A job already being handled when shutdown arrives is finished before
    /// the loop exits.
    pub async fn run<S: JobSource>(self, mut source: S, mut shutdown_rx: watch::Receiver<bool>) {
        info!("ScoringWorker started");

        loop {
            let next = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("ScoringWorker received shutdown signal");
                        break;
                    }
                    continue;
                }

                next = source.next() => next,
            };

            match next {
                Ok(Some(delivery)) => self.process_delivery(&mut source, delivery).await,
                Ok(None) => {
                    info!("Job source closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to receive job");
                    tokio::time::sleep(self.failure_backoff).await;
                }
            }
        }

        info!("ScoringWorker shutdown complete");
    }

    async fn process_delivery<S: JobSource>(&self, source: &mut S, delivery: Delivery) {
        debug!(
            partition = delivery.partition,
            offset = delivery.offset,
            "Received job"
        );
        match self.screen(&delivery).await {
            Ok(outcome) => {
                if let ScreeningOutcome::Reviewed {
                    processing_id,
                    analysis,
                } = &outcome
                {
                    info!(
                        processing_id = %processing_id,
                        risk_score = analysis.risk_score,
                        risk_level = %analysis.risk_level,
                        "Transaction reviewed"
                    );
                }
                if let Err(e) = source.commit(&delivery).await {
                    warn!(offset = delivery.offset, error = %e, "Failed to commit job");
                }
            }
            Err(e) => {
                error!(
                    offset = delivery.offset,
                    error = %e,
                    "Failed to screen job, scheduling redelivery"
                );
                if let Err(e) = source.redeliver(delivery).await {
                    error!(error = %e, "Failed to rewind job");
                }
                tokio::time::sleep(self.failure_backoff).await;
            }
        }
    }
}

impl ScoringWorker {
    /// Screen one delivery without touching the source.
    #[tracing::instrument(skip_all, err, fields(offset = delivery.offset))]
    pub async fn screen(&self, delivery: &Delivery) -> Result<ScreeningOutcome, ScoringError> {
        let event = match delivery.decode() {
            Ok(event) if !event.processing_id().is_empty() => event,
            Ok(_) => {
                warn!("Dropping job without processing id");
                return Ok(ScreeningOutcome::Poison);
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed job");
                return Ok(ScreeningOutcome::Poison);
            }
        };
        let processing_id = event.processing_id().to_string();

        let Some(transaction) = self
            .db
            .process(GetFullTransaction {
                processing_id: processing_id.clone(),
                retry: self.lookup_retry,
            })
            .await?
        else {
            warn!(processing_id = %processing_id, "No submission for job");
            return Ok(ScreeningOutcome::NotFound { processing_id });
        };

        let analysis = self.analyzer.analyze(&transaction).await?;

        if let Err(e) = self.fast_store.put_analysis(&processing_id, &analysis).await {
            warn!(processing_id = %processing_id, error = %e, "Failed to cache analysis");
        }

        let updated = self
            .db
            .process(UpdateSubmissionAnalysis {
                processing_id: processing_id.clone(),
                risk_score: analysis.risk_score,
                risk_level: analysis.risk_level.into(),
                analyzed_at: analysis.analyzed_at,
            })
            .await?;
        if updated == 0 {
            warn!(processing_id = %processing_id, "Submission cleared before update");
            return Ok(ScreeningOutcome::NotFound { processing_id });
        }

        if let Err(e) = self.fast_store.incr_stats(analysis.risk_level).await {
            warn!(processing_id = %processing_id, error = %e, "Failed to update risk stats");
        }

        Ok(ScreeningOutcome::Reviewed {
            processing_id,
            analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryFastStore;
    use crate::entities::SubmissionStatus;
    use crate::entities::submissions::tests::sample_transaction;
    use crate::entities::submissions::{ClearSubmissions, GetSubmission, SaveSubmission};
    use crate::events::{ChannelJobPublisher, ChannelJobSource, JobEvent, JobPublisher, job_channel};
    use crate::framework::connect_in_memory;
    use crate::risk::RiskEngine;
    use aml_sdk::objects::{RiskFlag, RiskLevel};
    use async_trait::async_trait;
    use time::OffsetDateTime;

    struct FixedAnalyzer;

    #[async_trait]
    impl TransactionAnalyzer for FixedAnalyzer {
        async fn analyze(
            &self,
            _tx: &aml_sdk::objects::Transaction,
        ) -> Result<RiskAnalysis, RiskError> {
            Ok(RiskAnalysis::from_score(
                45,
                vec![RiskFlag::LargeAmount, RiskFlag::UnusualTime],
                OffsetDateTime::now_utc(),
            ))
        }
    }

    /// Drops every submission mid-screen, between the lookup and the update.
    struct ClearingAnalyzer {
        db: DatabaseProcessor,
    }

    #[async_trait]
    impl TransactionAnalyzer for ClearingAnalyzer {
        async fn analyze(
            &self,
            tx: &aml_sdk::objects::Transaction,
        ) -> Result<RiskAnalysis, RiskError> {
            self.db.process(ClearSubmissions).await.unwrap();
            FixedAnalyzer.analyze(tx).await
        }
    }

    struct Harness {
        db: DatabaseProcessor,
        store: Arc<InMemoryFastStore>,
        worker: ScoringWorker,
        publisher: ChannelJobPublisher,
        source: ChannelJobSource,
    }

    async fn harness() -> Harness {
        let db = DatabaseProcessor {
            pool: connect_in_memory().await.unwrap(),
        };
        let store = Arc::new(InMemoryFastStore::new());
        store.seed_blacklists().await.unwrap();
        let worker = ScoringWorker::new(
            db.clone(),
            Arc::new(RiskEngine::new(store.clone())),
            store.clone(),
        )
        .with_lookup_retry(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        })
        .with_failure_backoff(Duration::from_millis(1));
        let (publisher, source) = job_channel();
        Harness {
            db,
            store,
            worker,
            publisher,
            source,
        }
    }

    async fn submit(h: &mut Harness, processing_id: &str) -> Delivery {
        let tx = sample_transaction("TX-9");
        h.db.process(SaveSubmission {
            processing_id: processing_id.to_string(),
            transaction: tx.clone(),
        })
        .await
        .unwrap();
        h.publisher
            .publish(&JobEvent::transaction_received(processing_id, &tx))
            .await
            .unwrap();
        h.source.next().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_job_moves_submission_to_reviewed() {
        let mut h = harness().await;
        let delivery = submit(&mut h, "proc_1").await;

        let outcome = h.worker.screen(&delivery).await.unwrap();
        let ScreeningOutcome::Reviewed { analysis, .. } = outcome else {
            panic!("expected reviewed, got {outcome:?}");
        };
        // 1 500 000.50 at 03:15 UTC
        assert_eq!(analysis.risk_score, 45);
        assert_eq!(analysis.risk_level, RiskLevel::Medium);

        let record = h
            .db
            .process(GetSubmission {
                processing_id: "proc_1".into(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubmissionStatus::Reviewed);
        assert_eq!(record.risk_score, Some(45));
        assert!(record.analysis_timestamp.is_some());

        let cached = h.store.get_analysis("proc_1").await.unwrap().unwrap();
        assert_eq!(cached.flags, analysis.flags);
        assert_eq!(h.store.get_stats(RiskLevel::Medium).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redelivery_converges_on_same_state() {
        let mut h = harness().await;
        let delivery = submit(&mut h, "proc_1").await;

        h.worker.screen(&delivery).await.unwrap();
        h.worker.screen(&delivery).await.unwrap();

        let record = h
            .db
            .process(GetSubmission {
                processing_id: "proc_1".into(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubmissionStatus::Reviewed);
        assert_eq!(record.risk_level, Some(RiskLevel::Medium.into()));
        // counters are not idempotent across redelivery
        assert_eq!(h.store.get_daily("40817810000000000001").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_poison() {
        let mut h = harness().await;
        h.publisher.publish_raw(b"{not json".to_vec()).await.unwrap();
        let delivery = h.source.next().await.unwrap().unwrap();
        assert!(matches!(
            h.worker.screen(&delivery).await.unwrap(),
            ScreeningOutcome::Poison
        ));
    }

    #[tokio::test]
    async fn test_unknown_submission_is_not_found() {
        let mut h = harness().await;
        h.publisher
            .publish(&JobEvent::transaction_received(
                "proc_missing",
                &sample_transaction("TX"),
            ))
            .await
            .unwrap();
        let delivery = h.source.next().await.unwrap().unwrap();
        assert!(matches!(
            h.worker.screen(&delivery).await.unwrap(),
            ScreeningOutcome::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_submission_cleared_during_screening_is_not_found() {
        let mut h = harness().await;
        let delivery = submit(&mut h, "proc_1").await;
        let worker = ScoringWorker::new(
            h.db.clone(),
            Arc::new(ClearingAnalyzer { db: h.db.clone() }),
            h.store.clone(),
        );

        match worker.screen(&delivery).await.unwrap() {
            ScreeningOutcome::NotFound { processing_id } => assert_eq!(processing_id, "proc_1"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(h.store.get_stats(RiskLevel::Medium).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_analysis_failure_keeps_submission_pending() {
        let mut h = harness().await;
        let delivery = submit(&mut h, "proc_1").await;
        h.store.set_failing(true);

        assert!(matches!(
            h.worker.screen(&delivery).await,
            Err(ScoringError::Analysis(_))
        ));
        let record = h
            .db
            .process(GetSubmission {
                processing_id: "proc_1".into(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubmissionStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_cache_failures_do_not_block_review() {
        let mut h = harness().await;
        let delivery = submit(&mut h, "proc_1").await;
        h.store.set_failing(true);
        let worker = ScoringWorker::new(h.db.clone(), Arc::new(FixedAnalyzer), h.store.clone());

        assert!(matches!(
            worker.screen(&delivery).await.unwrap(),
            ScreeningOutcome::Reviewed { .. }
        ));
        let record = h
            .db
            .process(GetSubmission {
                processing_id: "proc_1".into(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubmissionStatus::Reviewed);
    }

    #[tokio::test]
    async fn test_run_commits_and_stops_on_shutdown() {
        let h = harness().await;
        let tx = sample_transaction("TX-9");
        h.db.process(SaveSubmission {
            processing_id: "proc_1".into(),
            transaction: tx.clone(),
        })
        .await
        .unwrap();
        h.publisher.publish_raw(b"garbage".to_vec()).await.unwrap();
        h.publisher
            .publish(&JobEvent::transaction_received("proc_1", &tx))
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let probe = h.source.clone();
        let handle = tokio::spawn(h.worker.clone().run(h.source, shutdown_rx));

        for _ in 0..200 {
            if probe.committed_offset() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(probe.committed_offset(), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let record = h
            .db
            .process(GetSubmission {
                processing_id: "proc_1".into(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubmissionStatus::Reviewed);
    }

    #[tokio::test]
    async fn test_failed_job_is_redelivered() {
        let mut h = harness().await;
        let delivery = submit(&mut h, "proc_1").await;
        h.store.set_failing(true);

        h.worker.process_delivery(&mut h.source, delivery.clone()).await;
        assert_eq!(h.source.committed_offset(), 0);

        h.store.set_failing(false);
        let again = h.source.next().await.unwrap().unwrap();
        assert_eq!(again, delivery);
        h.worker.process_delivery(&mut h.source, again).await;
        assert_eq!(h.source.committed_offset(), 1);
    }
}
