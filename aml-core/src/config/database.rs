//! Primary store configuration.

use std::path::PathBuf;

/// Location of the SQLite file backing the primary store.
#[derive(Debug, Clone, PartialEq, Eq)]
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
