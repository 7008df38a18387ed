//! Primary-store records: one row per submitted transaction.

use crate::entities::{RiskLevel, SubmissionStatus};
use crate::framework::DatabaseProcessor;
use crate::utils::lock_retry::{RetryPolicy, with_lock_retry};
use aml_sdk::objects::Transaction;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::str::FromStr;
use time::{OffsetDateTime, UtcOffset};
use tracing::debug;

macro_rules! select_submissions {
    ($tail:literal) => {
        concat!(
            "SELECT id, processing_id, transaction_id, account_number, amount, currency, ",
            "transaction_type, counterparty_account, counterparty_bank, counterparty_country, ",
            "timestamp, channel, user_id, branch_id, status, risk_score, risk_level, ",
            "analysis_timestamp, created_at, updated_at FROM transactions ",
            $tail
        )
    };
}

/// A persisted submission and its screening result, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub id: i64,
    pub processing_id: String,
    pub transaction: Transaction,
    pub status: SubmissionStatus,
    pub risk_score: Option<u32>,
    pub risk_level: Option<RiskLevel>,
    pub analysis_timestamp: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl<'r> FromRow<'r, SqliteRow> for SubmissionRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let amount: String = row.try_get("amount")?;
        let amount = Decimal::from_str(&amount).map_err(|e| sqlx::Error::ColumnDecode {
            index: "amount".to_string(),
            source: Box::new(e),
        })?;
        let risk_score = row
            .try_get::<Option<i64>, _>("risk_score")?
            .map(u32::try_from)
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "risk_score".to_string(),
                source: Box::new(e),
            })?;
        Ok(Self {
            id: row.try_get("id")?,
            processing_id: row.try_get("processing_id")?,
            transaction: Transaction {
                transaction_id: row.try_get("transaction_id")?,
                account_number: row.try_get("account_number")?,
                amount,
                currency: row.try_get("currency")?,
                transaction_type: row.try_get("transaction_type")?,
                counterparty_account: row.try_get("counterparty_account")?,
                counterparty_bank: row.try_get("counterparty_bank")?,
                counterparty_country: row.try_get("counterparty_country")?,
                timestamp: row.try_get("timestamp")?,
                channel: row.try_get("channel")?,
                user_id: row.try_get("user_id")?,
                branch_id: row.try_get("branch_id")?,
            },
            status: row.try_get("status")?,
            risk_score,
            risk_level: row.try_get("risk_level")?,
            analysis_timestamp: row.try_get("analysis_timestamp")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Persist a new submission in `pending_review`.
///
/// Fails with a unique violation if `processing_id` already exists.
/// Returns the synthetic row id.
#[derive(Debug, Clone)]
pub struct SaveSubmission {
    pub processing_id: String,
    pub transaction: Transaction,
}

impl Processor<SaveSubmission> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SaveSubmission")]
    async fn process(&self, cmd: SaveSubmission) -> Result<i64, sqlx::Error> {
        let SaveSubmission {
            processing_id,
            transaction: tx,
        } = cmd;
        let amount = tx.amount.to_string();
        let now = OffsetDateTime::now_utc();
        let result = with_lock_retry(RetryPolicy::PRIMARY_STORE, "SaveSubmission", || {
            sqlx::query(
                r#"
                INSERT INTO transactions (
                    processing_id, transaction_id, account_number, amount, currency,
                    transaction_type, counterparty_account, counterparty_bank,
                    counterparty_country, timestamp, channel, user_id, branch_id,
                    status, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&processing_id)
            .bind(&tx.transaction_id)
            .bind(&tx.account_number)
            .bind(&amount)
            .bind(&tx.currency)
            .bind(&tx.transaction_type)
            .bind(&tx.counterparty_account)
            .bind(&tx.counterparty_bank)
            .bind(&tx.counterparty_country)
            .bind(tx.timestamp)
            .bind(&tx.channel)
            .bind(&tx.user_id)
            .bind(&tx.branch_id)
            .bind(SubmissionStatus::PendingReview)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
        })
        .await?;
        Ok(result.last_insert_rowid())
    }
}

/// Attach a screening result and move the submission to `reviewed`.
///
/// Unconditional overwrite: re-applying the same result is harmless.
/// Returns the number of rows updated (0 if the submission does not exist).
#[derive(Debug, Clone)]
pub struct UpdateSubmissionAnalysis {
    pub processing_id: String,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub analyzed_at: OffsetDateTime,
}

impl Processor<UpdateSubmissionAnalysis> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateSubmissionAnalysis")]
    async fn process(&self, cmd: UpdateSubmissionAnalysis) -> Result<u64, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let result = with_lock_retry(
            RetryPolicy::PRIMARY_STORE,
            "UpdateSubmissionAnalysis",
            || {
                sqlx::query(
                    r#"
                    UPDATE transactions
                    SET status = ?, risk_score = ?, risk_level = ?,
                        analysis_timestamp = ?, updated_at = ?
                    WHERE processing_id = ?
                    "#,
                )
                .bind(SubmissionStatus::Reviewed)
                .bind(i64::from(cmd.risk_score))
                .bind(cmd.risk_level)
                .bind(cmd.analyzed_at)
                .bind(now)
                .bind(&cmd.processing_id)
                .execute(&self.pool)
            },
        )
        .await?;
        Ok(result.rows_affected())
    }
}

/// Look up a submission by processing id.
#[derive(Debug, Clone)]
pub struct GetSubmission {
    pub processing_id: String,
}

impl Processor<GetSubmission> for DatabaseProcessor {
    type Output = Option<SubmissionRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetSubmission")]
    async fn process(&self, query: GetSubmission) -> Result<Option<SubmissionRecord>, sqlx::Error> {
        with_lock_retry(RetryPolicy::PRIMARY_STORE, "GetSubmission", || {
            sqlx::query_as::<_, SubmissionRecord>(select_submissions!("WHERE processing_id = ?"))
                .bind(&query.processing_id)
                .fetch_optional(&self.pool)
        })
        .await
    }
}

/// Load the full transaction for screening.
///
/// The scoring worker can see a job before the submission's write is
/// visible, so a missing row is retried with the same policy as lock
/// contention. `None` means the row was still absent after every attempt.
#[derive(Debug, Clone)]
pub struct GetFullTransaction {
    pub processing_id: String,
    pub retry: RetryPolicy,
}

impl GetFullTransaction {
    pub fn new(processing_id: impl Into<String>) -> Self {
        Self {
            processing_id: processing_id.into(),
            retry: RetryPolicy::PRIMARY_STORE,
        }
    }
}

impl Processor<GetFullTransaction> for DatabaseProcessor {
    type Output = Option<Transaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetFullTransaction")]
    async fn process(&self, query: GetFullTransaction) -> Result<Option<Transaction>, sqlx::Error> {
        let policy = query.retry;
        let mut attempt = 1;
        loop {
            let record = with_lock_retry(policy, "GetFullTransaction", || {
                sqlx::query_as::<_, SubmissionRecord>(select_submissions!(
                    "WHERE processing_id = ?"
                ))
                .bind(&query.processing_id)
                .fetch_optional(&self.pool)
            })
            .await?;
            match record {
                Some(record) => return Ok(Some(record.transaction)),
                None if attempt < policy.max_attempts => {
                    debug!(
                        processing_id = %query.processing_id,
                        attempt,
                        "Submission not visible yet, retrying"
                    );
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                    attempt += 1;
                }
                None => return Ok(None),
            }
        }
    }
}

/// Most recent submissions first. Row ids follow insertion order, so they
/// order by `created_at` without comparing timestamp text.
#[derive(Debug, Clone)]
pub struct ListSubmissions {
    pub limit: i64,
}

impl Processor<ListSubmissions> for DatabaseProcessor {
    type Output = Vec<SubmissionRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListSubmissions")]
    async fn process(&self, query: ListSubmissions) -> Result<Vec<SubmissionRecord>, sqlx::Error> {
        with_lock_retry(RetryPolicy::PRIMARY_STORE, "ListSubmissions", || {
            sqlx::query_as::<_, SubmissionRecord>(select_submissions!(
                "ORDER BY id DESC LIMIT ?"
            ))
            .bind(query.limit)
            .fetch_all(&self.pool)
        })
        .await
    }
}

/// Submissions still in `pending_review` that were created before a cutoff,
/// oldest first.
///
/// The cutoff is compared as text. Every `created_at` is written by
/// [`SaveSubmission`] from `now_utc()`, and the cutoff is shifted to UTC
/// before binding, so both sides share one format.
#[derive(Debug, Clone)]
pub struct ListPendingSubmissions {
    pub created_before: OffsetDateTime,
    pub limit: i64,
}

impl Processor<ListPendingSubmissions> for DatabaseProcessor {
    type Output = Vec<SubmissionRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListPendingSubmissions")]
    async fn process(
        &self,
        query: ListPendingSubmissions,
    ) -> Result<Vec<SubmissionRecord>, sqlx::Error> {
        with_lock_retry(RetryPolicy::PRIMARY_STORE, "ListPendingSubmissions", || {
            sqlx::query_as::<_, SubmissionRecord>(select_submissions!(
                "WHERE status = ? AND created_at < ? ORDER BY id ASC LIMIT ?"
            ))
            .bind(SubmissionStatus::PendingReview)
            .bind(query.created_before.to_offset(UtcOffset::UTC))
            .bind(query.limit)
            .fetch_all(&self.pool)
        })
        .await
    }
}

/// Drop every submission. Returns the number of rows deleted.
#[derive(Debug, Clone)]
pub struct ClearSubmissions;

impl Processor<ClearSubmissions> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClearSubmissions")]
    async fn process(&self, _cmd: ClearSubmissions) -> Result<u64, sqlx::Error> {
        let result = with_lock_retry(RetryPolicy::PRIMARY_STORE, "ClearSubmissions", || {
            sqlx::query("DELETE FROM transactions").execute(&self.pool)
        })
        .await?;
        Ok(result.rows_affected())
    }
}
