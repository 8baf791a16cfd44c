use super::supervisor::{WorkerExit, WorkerReport};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Completed,
    /// Workers still running when the timeout hit; they were aborted.
    TimedOut { remaining: usize },
}

pub(super) async fn drain_workers(
    workers: &mut JoinSet<WorkerReport>,
    cancel: &CancellationToken,
    timeout: Duration,
) -> ShutdownOutcome {
    cancel.cancel();

    let drained = tokio::time::timeout(timeout, async {
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(WorkerReport {
                    name,
                    exit: WorkerExit::CannotContinue(reason),
                }) => tracing::warn!(worker = %name, %reason, "Worker stopped with error"),
                Ok(WorkerReport { name, .. }) => tracing::debug!(worker = %name, "Worker stopped"),
                Err(error) => tracing::warn!(%error, "Worker task failed during shutdown"),
            }
        }
    })
    .await;

    if drained.is_ok() {
        tracing::info!("All workers stopped");
        return ShutdownOutcome::Completed;
    }

    let remaining = workers.len();
    tracing::warn!(
        remaining,
        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        "Timed out waiting for workers; aborting"
    );
    workers.abort_all();
    ShutdownOutcome::TimedOut { remaining }
}
