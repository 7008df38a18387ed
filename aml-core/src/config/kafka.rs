//! Event bus configuration.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub consumer_group: String,
    /// How long a publish may wait for acknowledgement.
    pub publish_timeout: Duration,
    pub producer_retries: u32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: "bank.transactions.received".to_string(),
            consumer_group: "fraud-detection-group".to_string(),
            publish_timeout: Duration::from_secs(5),
            producer_retries: 5,
        }
    }
}
