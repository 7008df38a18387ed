//! Ingestion: validate, persist, then publish a screening job.
//!
//! The submission is committed to the primary store before the job is
//! published. If publishing fails the caller gets an error and the
//! submission stays in `pending_review` until an operator replays it with
//! [`IngestionService::republish_pending`].

use crate::entities::submissions::{ListPendingSubmissions, SaveSubmission};
use crate::events::{BusError, JobEvent, JobPublisher};
use crate::framework::DatabaseProcessor;
use crate::utils::ids::new_processing_id;
use aml_sdk::objects::{PayloadError, ProcessingResponse, SubmissionStatus, TransactionPayload};
use kanau::processor::Processor;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

pub const ACCEPTED_MESSAGE: &str = "Transaction accepted for analysis";

/// Errors that can occur while ingesting a transaction.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload was rejected; nothing was written.
    #[error("invalid transaction: {0}")]
    Validation(#[from] PayloadError),

    /// The primary store refused the write; nothing was persisted.
    #[error("primary store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    /// The submission was persisted but its job could not be published.
    #[error("event bus unavailable, submission {processing_id} left pending: {source}")]
    BusUnavailable {
        processing_id: String,
        #[source]
        source: BusError,
    },
}

#[derive(Clone)]
pub struct IngestionService {
    db: DatabaseProcessor,
    publisher: Arc<dyn JobPublisher>,
}

impl IngestionService {
    pub fn new(db: DatabaseProcessor, publisher: Arc<dyn JobPublisher>) -> Self {
        Self { db, publisher }
    }

    /// Republish jobs for submissions still pending after `older_than`.
    ///
    /// Returns the number of jobs published. Stops at the first publish
    /// failure.
    pub async fn republish_pending(
        &self,
        older_than: time::Duration,
        limit: i64,
    ) -> Result<u64, IngestError> {
        let pending = self
            .db
            .process(ListPendingSubmissions {
                created_before: OffsetDateTime::now_utc() - older_than,
                limit,
            })
            .await
            .map_err(IngestError::StoreUnavailable)?;

        let mut republished = 0;
        for record in pending {
            let event = JobEvent::transaction_received(&record.processing_id, &record.transaction);
            self.publisher
                .publish(&event)
                .await
                .map_err(|source| IngestError::BusUnavailable {
                    processing_id: record.processing_id.clone(),
                    source,
                })?;
            republished += 1;
        }
        if republished > 0 {
            info!(republished, "Republished pending submissions");
        }
        Ok(republished)
    }
}

impl Processor<TransactionPayload> for IngestionService {
    type Output = ProcessingResponse;
    type Error = IngestError;
    #[tracing::instrument(skip_all, err, fields(transaction_id = %payload.transaction_id))]
    async fn process(&self, payload: TransactionPayload) -> Result<ProcessingResponse, IngestError> {
        payload.validate()?;
        let transaction = payload.into_transaction(OffsetDateTime::now_utc());
        let processing_id = new_processing_id();

        self.db
            .process(SaveSubmission {
                processing_id: processing_id.clone(),
                transaction: transaction.clone(),
            })
            .await
            .map_err(IngestError::StoreUnavailable)?;

        let event = JobEvent::transaction_received(&processing_id, &transaction);
        if let Err(source) = self.publisher.publish(&event).await {
            error!(
                processing_id = %processing_id,
                error = %source,
                "Failed to publish job, submission left pending"
            );
            return Err(IngestError::BusUnavailable {
                processing_id,
                source,
            });
        }

        info!(processing_id = %processing_id, "Transaction accepted");
        if transaction.counterparty_country.is_empty() {
            warn!(processing_id = %processing_id, "No counterparty country supplied");
        }
        Ok(ProcessingResponse {
            processing_id,
            status: SubmissionStatus::PendingReview,
            message: ACCEPTED_MESSAGE.to_string(),
        })
    }
}
