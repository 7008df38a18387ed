//! Event bus between ingestion and scoring.
//!
//! # Event Flow
//!
//! 1. `IngestionService` persists a submission, then publishes a
//!    `transaction_received` [`JobEvent`] through a [`JobPublisher`]
//! 2. `ScoringWorker` pulls [`Delivery`]s from a [`JobSource`], screens the
//!    submission and commits the delivery
//!
//! Delivery is at least once. A delivery that is not committed is rewound
//! and seen again.

pub mod channels;
pub mod kafka;
pub mod types;

pub use channels::{ChannelJobPublisher, ChannelJobSource, DEFAULT_CHANNEL_BUFFER, job_channel};
pub use kafka::{KafkaJobPublisher, KafkaJobSource};
pub use types::{Delivery, JobData, JobEvent, TRANSACTION_RECEIVED};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur on the event bus.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event bus closed")]
    Closed,
}

/// Producer side of the bus.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    /// Publish and wait for the bus to acknowledge.
    async fn publish(&self, event: &JobEvent) -> Result<(), BusError>;
}

/// Consumer side of the bus. One source per worker.
#[async_trait]
pub trait JobSource: Send {
    /// Wait for the next delivery. `None` once the bus is closed.
    async fn next(&mut self) -> Result<Option<Delivery>, BusError>;

    /// Mark `delivery` and everything before it on its partition as handled.
    async fn commit(&mut self, delivery: &Delivery) -> Result<(), BusError>;

    /// Hand `delivery` back so that it is seen again.
    async fn redeliver(&mut self, delivery: Delivery) -> Result<(), BusError>;
}
