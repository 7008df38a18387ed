//! Configuration types for the screening pipeline.
//!
//! These types represent the validated runtime configuration used by the server
//! and can be shared across crates. The actual config loading/parsing is handled
//! by the server crate.

mod backends;
mod database;
mod kafka;
mod redis;

pub use backends::{BusBackend, FastStoreBackend};
pub use database::DatabaseConfig;
pub use kafka::KafkaConfig;
pub use self::redis::RedisConfig;
