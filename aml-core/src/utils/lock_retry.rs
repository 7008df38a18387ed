//! Bounded retry for primary-store lock contention.
//!
//! The primary store has a single writer. Concurrent callers can observe
//! `SQLITE_BUSY` / `SQLITE_LOCKED` or time out waiting for the connection;
//! those failures are retried with a linear back-off, everything else is
//! returned immediately.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Linear back-off: attempt `n` waits `base_delay * n` before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const PRIMARY_STORE: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(50),
    };

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::PRIMARY_STORE
    }
}

const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Whether `err` is transient contention on the primary store.
pub fn is_lock_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            // extended result codes keep the primary code in the low byte
            let primary = db
                .code()
                .and_then(|c| c.parse::<i64>().ok())
                .map(|c| c & 0xff);
            if matches!(primary, Some(SQLITE_BUSY | SQLITE_LOCKED)) {
                return true;
            }
            let message = db.message().to_ascii_lowercase();
            message.contains("database is locked") || message.contains("busy")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Run `op` until it succeeds, fails with a non-contention error, or the
/// policy's attempts are exhausted.
pub async fn with_lock_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if attempt < policy.max_attempts && is_lock_contention(&e) => {
                warn!(operation, attempt, error = %e, "Primary store contended, retrying");
                tokio::time::sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
