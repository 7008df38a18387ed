//! Signal handling for graceful shutdown.

use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// How long servers and workers get to finish in-flight work after shutdown
/// is signalled.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Failed to install signal handlers, falling back to Ctrl+C");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Resolves once `rx` observes `true` or its sender is dropped.
pub async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // Err means the sender is gone, which is also a shutdown.
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Join every task in `tasks`, giving up at `deadline`.
///
/// Returns the number of tasks that had to be aborted.
pub async fn drain<T: 'static>(
    name: &'static str,
    tasks: &mut JoinSet<T>,
    deadline: Instant,
    mut on_result: impl FnMut(T),
) -> usize {
    loop {
        match tokio::time::timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok(value))) => on_result(value),
            Ok(Some(Err(e))) => tracing::error!(task = name, error = %e, "Task panicked"),
            Ok(None) => return 0,
            Err(_) => {
                let remaining = tasks.len();
                tracing::warn!(
                    task = name,
                    remaining,
                    "Shutdown grace period elapsed, aborting"
                );
                tasks.abort_all();
                return remaining;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_shutdown_resolves_on_signal() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_for_shutdown(rx));
        tx.send(true).unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_resolves_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        wait_for_shutdown(rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_aborts_stragglers() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { 1 });
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            2
        });

        let mut finished = Vec::new();
        let aborted = drain(
            "test",
            &mut tasks,
            Instant::now() + SHUTDOWN_GRACE,
            |v| finished.push(v),
        )
        .await;
        assert_eq!(finished, vec![1]);
        assert_eq!(aborted, 1);
    }
}
