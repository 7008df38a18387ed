//! Configuration module for aml-server.
//!
//! Handles loading configuration from an optional TOML file and applying
//! environment variable overrides on top of it.

pub mod file;

use crate::config::file::FileConfig;
use aml_core::config::{BusBackend, DatabaseConfig, FastStoreBackend, KafkaConfig, RedisConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Which services this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::Subcommand)]
pub enum Role {
    /// Ingestion service: accepts submissions and publishes screening jobs.
    Ingest,
    /// Fraud-detection service: consumes jobs and scores them.
    Screen,
    /// Both services in one process.
    All,
}

impl Role {
    pub fn runs_ingestion(self) -> bool {
        matches!(self, Role::Ingest | Role::All)
    }

    pub fn runs_screening(self) -> bool {
        matches!(self, Role::Screen | Role::All)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub ingestion_listen: SocketAddr,
    pub fraud_detection_listen: SocketAddr,
    pub scoring_workers: usize,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub fast_store: FastStoreBackend,
    pub bus: BusBackend,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    role: Role,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, role: Role) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            role,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file, or fall back to defaults if it does not exist
    /// 2. Apply environment overrides
    /// 3. Validate the result for the selected role
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = if self.config_path.exists() {
            let config_content = std::fs::read_to_string(&self.config_path)?;
            toml::from_str(&config_content)?
        } else {
            tracing::info!(
                path = %self.config_path.display(),
                "Config file not found, using defaults"
            );
            FileConfig::default()
        };

        apply_env_overrides(&mut file_config, |var| std::env::var(var).ok())?;
        validate(&file_config, self.role)?;
        Ok(build_loaded_config(file_config))
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(
    config: &mut FileConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = lookup("DB_PATH") {
        config.database.path = PathBuf::from(v);
    }
    if let Some(v) = lookup("REDIS_HOST") {
        config.redis.host = v;
    }
    if let Some(v) = lookup("REDIS_PORT") {
        config.redis.port = parse_env("REDIS_PORT", v)?;
    }
    if let Some(v) = lookup("REDIS_PASSWORD") {
        config.redis.password = (!v.is_empty()).then_some(v);
    }
    if let Some(v) = lookup("REDIS_DB") {
        config.redis.db = parse_env("REDIS_DB", v)?;
    }
    if let Some(v) = lookup("KAFKA_BROKERS") {
        config.kafka.brokers = v
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(v) = lookup("KAFKA_TRANSACTION_TOPIC") {
        config.kafka.topic = v;
    }
    if let Some(v) = lookup("KAFKA_CONSUMER_GROUP") {
        config.kafka.consumer_group = v;
    }
    if let Some(v) = lookup("INGESTION_SERVICE_PORT") {
        config.server.ingestion_port = parse_env("INGESTION_SERVICE_PORT", v)?;
    }
    if let Some(v) = lookup("FRAUD_DETECTION_SERVICE_PORT") {
        config.server.fraud_detection_port = parse_env("FRAUD_DETECTION_SERVICE_PORT", v)?;
    }
    if let Some(v) = lookup("SCORING_WORKERS") {
        config.server.scoring_workers = parse_env("SCORING_WORKERS", v)?;
    }
    Ok(())
}

fn validate(config: &FileConfig, role: Role) -> Result<(), ConfigError> {
    if config.server.scoring_workers == 0 {
        return Err(ConfigError::ValidationError(
            "scoring_workers must be at least 1".to_string(),
        ));
    }
    if config.backends.bus == BusBackend::Memory {
        if role != Role::All {
            return Err(ConfigError::ValidationError(
                "the memory bus backend requires the `all` role".to_string(),
            ));
        }
    } else {
        if config.kafka.brokers.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one Kafka broker is required".to_string(),
            ));
        }
        if config.kafka.topic.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Kafka topic must not be empty".to_string(),
            ));
        }
        if role.runs_screening() && config.kafka.consumer_group.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Kafka consumer group must not be empty".to_string(),
            ));
        }
    }
    if role == Role::All && config.server.ingestion_port == config.server.fraud_detection_port {
        return Err(ConfigError::ValidationError(format!(
            "ingestion and fraud-detection services cannot share port {}",
            config.server.ingestion_port
        )));
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let bind = file_config.server.bind;
    LoadedConfig {
        server: ServerConfig {
            ingestion_listen: SocketAddr::new(bind, file_config.server.ingestion_port),
            fraud_detection_listen: SocketAddr::new(bind, file_config.server.fraud_detection_port),
            scoring_workers: file_config.server.scoring_workers,
        },
        database: DatabaseConfig {
            path: file_config.database.path,
        },
        redis: RedisConfig {
            host: file_config.redis.host,
            port: file_config.redis.port,
            password: file_config.redis.password,
            db: file_config.redis.db,
        },
        kafka: KafkaConfig {
            brokers: file_config.kafka.brokers,
            topic: file_config.kafka.topic,
            consumer_group: file_config.kafka.consumer_group,
            publish_timeout: Duration::from_secs(file_config.kafka.publish_timeout_secs),
            producer_retries: file_config.kafka.producer_retries,
        },
        fast_store: file_config.backends.fast_store,
        bus: file_config.backends.bus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = FileConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("DB_PATH", "/tmp/aml.db"),
                ("REDIS_HOST", "redis"),
                ("REDIS_PORT", "6380"),
                ("REDIS_PASSWORD", "pw"),
                ("REDIS_DB", "3"),
                ("KAFKA_BROKERS", "kafka-1:9092, kafka-2:9092,"),
                ("KAFKA_TRANSACTION_TOPIC", "tx.in"),
                ("KAFKA_CONSUMER_GROUP", "g"),
                ("INGESTION_SERVICE_PORT", "18080"),
                ("FRAUD_DETECTION_SERVICE_PORT", "18081"),
                ("SCORING_WORKERS", "3"),
            ]),
        )
        .unwrap();

        let loaded = build_loaded_config(config);
        assert_eq!(loaded.database.path, PathBuf::from("/tmp/aml.db"));
        assert_eq!(loaded.redis.url(), "redis://:pw@redis:6380/3");
        assert_eq!(loaded.kafka.brokers, vec!["kafka-1:9092", "kafka-2:9092"]);
        assert_eq!(loaded.kafka.topic, "tx.in");
        assert_eq!(loaded.kafka.consumer_group, "g");
        assert_eq!(loaded.server.ingestion_listen.port(), 18080);
        assert_eq!(loaded.server.fraud_detection_listen.port(), 18081);
        assert_eq!(loaded.server.scoring_workers, 3);
    }

    #[test]
    fn test_empty_password_clears_it() {
        let mut config = FileConfig::default();
        config.redis.password = Some("old".to_string());
        apply_env_overrides(&mut config, env(&[("REDIS_PASSWORD", "")])).unwrap();
        assert!(config.redis.password.is_none());
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let mut config = FileConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("REDIS_PORT", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "REDIS_PORT", .. }));
    }

    #[test]
    fn test_memory_bus_requires_all_role() {
        let mut config = FileConfig::default();
        config.backends.bus = BusBackend::Memory;
        assert!(validate(&config, Role::Ingest).is_err());
        assert!(validate(&config, Role::Screen).is_err());
        assert!(validate(&config, Role::All).is_ok());
    }

    #[test]
    fn test_kafka_requires_brokers() {
        let mut config = FileConfig::default();
        config.kafka.brokers.clear();
        assert!(validate(&config, Role::Ingest).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = FileConfig::default();
        config.server.scoring_workers = 0;
        assert!(validate(&config, Role::Screen).is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let loader = ConfigLoader::new("/nonexistent/aml-config.toml", Role::Ingest);
        let loaded = loader.load().unwrap();
        assert_eq!(loaded.kafka.consumer_group, "fraud-detection-group");
    }
}
