//! Backend selection.

use serde::{Deserialize, Serialize};

/// Which fast store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FastStoreBackend {
    #[default]
    Redis,
    /// In-process store; state is lost on restart.
    Memory,
}

/// Which event bus to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    #[default]
    Kafka,
    /// In-process channel; only usable when ingestion and scoring share a
    /// process.
    Memory,
}
