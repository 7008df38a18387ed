pub mod ids;
pub mod lock_retry;
