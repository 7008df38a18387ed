//! In-process bus built on a bounded mpsc channel.
//!
//! Used when ingestion and scoring run in the same process without a
//! broker, and in tests. Offsets are assigned in publish order on a single
//! partition.

use super::types::{Delivery, JobEvent};
use super::{BusError, JobPublisher, JobSource};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, mpsc};

/// Default buffer size for the job channel.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

const TOPIC: &str = "in-process";

/// Create a new job channel.
///
/// Returns a (publisher, source) pair. Both halves can be cloned; cloned
/// sources share the queue and compete for deliveries.
pub fn job_channel() -> (ChannelJobPublisher, ChannelJobSource) {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
    let publisher = ChannelJobPublisher {
        tx,
        next_offset: Arc::new(AtomicI64::new(0)),
    };
    let source = ChannelJobSource {
        rx: Arc::new(Mutex::new(rx)),
        rewound: VecDeque::new(),
        committed: Arc::new(AtomicI64::new(0)),
    };
    (publisher, source)
}

#[derive(Clone)]
pub struct ChannelJobPublisher {
    tx: mpsc::Sender<(i64, Vec<u8>)>,
    next_offset: Arc<AtomicI64>,
}

impl ChannelJobPublisher {
    /// Publish an arbitrary payload, bypassing event serialization.
    pub async fn publish_raw(&self, payload: Vec<u8>) -> Result<i64, BusError> {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        self.tx
            .send((offset, payload))
            .await
            .map_err(|_| BusError::Closed)?;
        Ok(offset)
    }
}

#[async_trait]
impl JobPublisher for ChannelJobPublisher {
    async fn publish(&self, event: &JobEvent) -> Result<(), BusError> {
        let payload = serde_json::to_vec(event)?;
        self.publish_raw(payload).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ChannelJobSource {
    rx: Arc<Mutex<mpsc::Receiver<(i64, Vec<u8>)>>>,
    rewound: VecDeque<Delivery>,
    committed: Arc<AtomicI64>,
}

impl ChannelJobSource {
    /// The next offset that has not been committed.
    pub fn committed_offset(&self) -> i64 {
        self.committed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSource for ChannelJobSource {
    async fn next(&mut self) -> Result<Option<Delivery>, BusError> {
        if let Some(delivery) = self.rewound.pop_front() {
            return Ok(Some(delivery));
        }
        let received = self.rx.lock().await.recv().await;
        Ok(received.map(|(offset, payload)| Delivery {
            topic: TOPIC.to_string(),
            partition: 0,
            offset,
            payload,
        }))
    }

    async fn commit(&mut self, delivery: &Delivery) -> Result<(), BusError> {
        self.committed
            .fetch_max(delivery.offset + 1, Ordering::SeqCst);
        Ok(())
    }

    async fn redeliver(&mut self, delivery: Delivery) -> Result<(), BusError> {
        self.rewound.push_back(delivery);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::submissions::tests::sample_transaction;

    #[tokio::test]
    async fn test_deliveries_in_publish_order() {
        let (publisher, mut source) = job_channel();
        for pid in ["proc_a", "proc_b"] {
            publisher
                .publish(&JobEvent::transaction_received(pid, &sample_transaction("TX")))
                .await
                .unwrap();
        }
        let first = source.next().await.unwrap().unwrap();
        let second = source.next().await.unwrap().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.decode().unwrap().processing_id(), "proc_a");
        assert_eq!(second.offset, 1);
        assert_eq!(second.decode().unwrap().processing_id(), "proc_b");
    }

    #[tokio::test]
    async fn test_redelivered_message_comes_back_first() {
        let (publisher, mut source) = job_channel();
        publisher.publish_raw(b"one".to_vec()).await.unwrap();
        publisher.publish_raw(b"two".to_vec()).await.unwrap();

        let first = source.next().await.unwrap().unwrap();
        source.redeliver(first.clone()).await.unwrap();
        assert_eq!(source.next().await.unwrap().unwrap(), first);

        source.commit(&first).await.unwrap();
        assert_eq!(source.committed_offset(), 1);
    }

    #[tokio::test]
    async fn test_closed_when_publishers_dropped() {
        let (publisher, mut source) = job_channel();
        drop(publisher);
        assert!(source.next().await.unwrap().is_none());
    }
}
