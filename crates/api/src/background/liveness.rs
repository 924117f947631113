//! Worker liveness monitor.
//!
//! Sweeps worker heartbeats on a fixed interval. Workers that miss
//! heartbeats long enough are demoted Active -> Stale -> Offline, and an
//! offline worker's in-flight tasks go back to the pending queue without
//! consuming a retry, since the task itself did nothing wrong.

use std::time::Duration;

use chrono::Utc;
use helios_core::state::{LIVENESS_CHECK_INTERVAL_SECS, OFFLINE_AFTER_SECS, STALE_AFTER_SECS};
use helios_db::repositories::{TaskRepo, WorkerRepo};
use helios_db::DbPool;
use tokio_util::sync::CancellationToken;

/// Background heartbeat sweeper.
///
/// A single long-lived Tokio task that demotes silent workers and
/// requeues whatever they were holding.
pub struct LivenessMonitor {
    pool: DbPool,
    check_interval: Duration,
}

impl LivenessMonitor {
    /// Create a monitor with the default check interval.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            check_interval: Duration::from_secs(LIVENESS_CHECK_INTERVAL_SECS),
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.check_interval);
        tracing::info!(
            check_interval_secs = self.check_interval.as_secs(),
            stale_after_secs = STALE_AFTER_SECS,
            offline_after_secs = OFFLINE_AFTER_SECS,
            "Liveness monitor started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Liveness monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "Liveness sweep failed");
                    }
                }
            }
        }
    }

    /// One sweep cycle: demote stale workers, take the long-silent ones
    /// offline, and requeue their tasks.
    async fn sweep(&self) -> Result<(), sqlx::Error> {
        let now = Utc::now();

        let stale_cutoff = now - chrono::Duration::seconds(STALE_AFTER_SECS as i64);
        for worker in WorkerRepo::mark_stale(&self.pool, stale_cutoff).await? {
            tracing::warn!(
                worker_id = worker.id,
                name = %worker.name,
                last_heartbeat_at = %worker.last_heartbeat_at,
                "Worker went stale",
            );
        }

        let offline_cutoff = now - chrono::Duration::seconds(OFFLINE_AFTER_SECS as i64);
        for worker in WorkerRepo::mark_offline(&self.pool, offline_cutoff).await? {
            let requeued = TaskRepo::requeue_for_worker(&self.pool, worker.id).await?;
            tracing::error!(
                worker_id = worker.id,
                name = %worker.name,
                requeued = requeued.len(),
                "Worker went offline, tasks requeued",
            );
            for task_id in requeued {
                tracing::info!(task_id, worker_id = worker.id, "Task returned to queue");
            }
        }

        Ok(())
    }
}
