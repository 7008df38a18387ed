//! TOML file configuration structures.
//!
//! These structs directly map to the `aml-config.toml` file format. Every
//! section is optional; missing keys take the defaults below.

use aml_core::config::{BusBackend, FastStoreBackend};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub backends: BackendsConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address both services bind to.
    pub bind: IpAddr,
    pub ingestion_port: u16,
    pub fraud_detection_port: u16,
    /// Number of scoring workers (Kafka consumers) in the screen role.
    pub scoring_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ingestion_port: 8080,
            fraud_detection_port: 8081,
            scoring_workers: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/bank_aml.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub consumer_group: String,
    pub publish_timeout_secs: u64,
    pub producer_retries: u32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: "bank.transactions.received".to_string(),
            consumer_group: "fraud-detection-group".to_string(),
            publish_timeout_secs: 5,
            producer_retries: 5,
        }
    }
}

/// Backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub fast_store: FastStoreBackend,
    pub bus: BusBackend,
}
