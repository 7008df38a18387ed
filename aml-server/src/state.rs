//! Application state shared across all request handlers.

use aml_core::cache::FastStore;
use aml_core::processors::IngestionService;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
/// Each service gets its own state: the ingestion service carries the
/// ingestion pipeline, the fraud-detection service carries the fast store.
#[derive(Clone)]
pub struct AppState {
    /// Primary store connection pool.
    pub db: SqlitePool,
    /// Present on the ingestion service.
    pub ingestion: Option<IngestionService>,
    /// Present on the fraud-detection service.
    pub fast_store: Option<Arc<dyn FastStore>>,
}

impl AppState {
    pub fn for_ingestion(db: SqlitePool, ingestion: IngestionService) -> Self {
        Self {
            db,
            ingestion: Some(ingestion),
            fast_store: None,
        }
    }

    pub fn for_screening(db: SqlitePool, fast_store: Arc<dyn FastStore>) -> Self {
        Self {
            db,
            ingestion: None,
            fast_store: Some(fast_store),
        }
    }
}
