//! Pipeline stages.
//!
//! - [`IngestionService`]: accepts a transaction, persists it and publishes
//!   a screening job
//! - [`ScoringWorker`]: consumes screening jobs and records the analysis

pub mod ingestion;
pub mod scoring_worker;

pub use ingestion::{ACCEPTED_MESSAGE, IngestError, IngestionService};
pub use scoring_worker::{FAILURE_BACKOFF, ScoringError, ScoringWorker, ScreeningOutcome};
