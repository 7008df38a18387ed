//! Kafka bus.
//!
//! - Producer: `FutureProducer`, `acks=all`, bounded retries, keyed by
//!   processing id
//! - Consumer: `StreamConsumer` in a consumer group, cooperative-sticky
//!   assignment, manual offset commits

use super::types::{Delivery, JobEvent};
use super::{BusError, JobPublisher, JobSource};
use crate::config::KafkaConfig;
use async_trait::async_trait;
use rdkafka::Message as KafkaMessage;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;
use tracing::debug;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaJobPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaJobPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("acks", "all")
            .set("retries", config.producer_retries.to_string())
            .set(
                "message.timeout.ms",
                config.publish_timeout.as_millis().to_string(),
            )
            .create()?;
        Ok(Self {
            producer,
            topic: config.topic.clone(),
            timeout: config.publish_timeout,
        })
    }
}

#[async_trait]
impl JobPublisher for KafkaJobPublisher {
    async fn publish(&self, event: &JobEvent) -> Result<(), BusError> {
        let payload = serde_json::to_vec(event)?;
        let record = FutureRecord::to(&self.topic)
            .key(event.processing_id())
            .payload(&payload);
        let (partition, offset) = self
            .producer
            .send(record, self.timeout)
            .await
            .map_err(|(e, _)| BusError::Kafka(e))?;
        debug!(
            processing_id = %event.processing_id(),
            partition,
            offset,
            "Published job event"
        );
        Ok(())
    }
}

pub struct KafkaJobSource {
    consumer: StreamConsumer,
}

impl KafkaJobSource {
    /// Join the consumer group and subscribe to the job topic. A fresh group
    /// starts from the oldest retained message.
    pub fn new(config: &KafkaConfig) -> Result<Self, BusError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("partition.assignment.strategy", "cooperative-sticky")
            .create()?;
        consumer.subscribe(&[config.topic.as_str()])?;
        Ok(Self { consumer })
    }
}

#[async_trait]
impl JobSource for KafkaJobSource {
    async fn next(&mut self) -> Result<Option<Delivery>, BusError> {
        let message = self.consumer.recv().await?;
        Ok(Some(Delivery {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }))
    }

    async fn commit(&mut self, delivery: &Delivery) -> Result<(), BusError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &delivery.topic,
            delivery.partition,
            Offset::Offset(delivery.offset + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }

    async fn redeliver(&mut self, delivery: Delivery) -> Result<(), BusError> {
        self.consumer.seek(
            &delivery.topic,
            delivery.partition,
            Offset::Offset(delivery.offset),
            SEEK_TIMEOUT,
        )?;
        Ok(())
    }
}
