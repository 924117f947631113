//! Repository for the `tasks` table.
//!
//! The claim and report methods are the concurrency-sensitive heart of
//! the farm: claims go through `FOR UPDATE SKIP LOCKED` and every report
//! mutation is guarded by the reporting worker and the expected status,
//! so a stale report from a worker that lost its claim is a no-op.

use helios_core::state::TaskCounts;
use helios_core::types::DbId;
use sqlx::PgPool;

use crate::models::status::{JobStatus, StatusId, TaskStatus};
use crate::models::task::{Task, TaskCountsRow};

/// Column list for `tasks` queries.
const COLUMNS: &str = "\
    id, job_id, frame, tile_col, tile_row, \
    tile_x, tile_y, tile_width, tile_height, settings, \
    status_id, worker_id, retry_count, output_path, error_message, \
    claimed_at, started_at, completed_at, created_at, updated_at";

/// Statuses a worker may legitimately report against.
const IN_FLIGHT_STATUSES: [StatusId; 2] = [
    TaskStatus::Claimed as StatusId,
    TaskStatus::Rendering as StatusId,
];

/// Provides claim, report, and query operations for render tasks.
pub struct TaskRepo;

impl TaskRepo {
    // ── Claiming ─────────────────────────────────────────────────────────

    /// Atomically claim the oldest pending task the worker can run.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent claimers never block or
    /// double-claim. Tasks are skipped when their job is not rendering
    /// (canceled, failed) or their project is paused; GPU jobs are skipped
    /// for workers without a GPU. The `NOT EXISTS` guard enforces
    /// one-task-per-worker inside the same statement, so two racing claims
    /// from one worker id cannot both win. Oldest task ID wins, which is
    /// FIFO in submission order.
    pub async fn claim_next(
        pool: &PgPool,
        worker_id: DbId,
        gpu_count: i32,
    ) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&Self::claim_sql())
            .bind(worker_id)
            .bind(TaskStatus::Claimed.id())
            .bind(TaskStatus::Pending.id())
            .bind(JobStatus::Rendering.id())
            .bind(gpu_count)
            .bind(&IN_FLIGHT_STATUSES[..])
            .fetch_optional(pool)
            .await
    }

    fn claim_sql() -> String {
        format!(
            "UPDATE tasks SET status_id = $2, worker_id = $1, claimed_at = NOW() \
             WHERE id = ( \
                 SELECT t.id FROM tasks t \
                 JOIN jobs j ON j.id = t.job_id \
                 JOIN projects p ON p.id = j.project_id \
                 WHERE t.status_id = $3 \
                   AND j.status_id = $4 \
                   AND p.is_paused = false \
                   AND (j.device <> 'GPU' OR $5 > 0) \
                   AND NOT EXISTS ( \
                       SELECT 1 FROM tasks h \
                       WHERE h.worker_id = $1 AND h.status_id = ANY($6) \
                   ) \
                 ORDER BY t.id ASC \
                 LIMIT 1 \
                 FOR UPDATE OF t SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        )
    }

    /// The task a worker currently holds, if any. A worker runs one task
    /// at a time.
    pub async fn find_active_for_worker(
        pool: &PgPool,
        worker_id: DbId,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks \
             WHERE worker_id = $1 AND status_id = ANY($2) \
             LIMIT 1"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(worker_id)
            .bind(&IN_FLIGHT_STATUSES[..])
            .fetch_optional(pool)
            .await
    }

    // ── Reports ──────────────────────────────────────────────────────────

    /// Record that a worker started rendering its claimed task.
    ///
    /// Returns `None` when the claim no longer belongs to this worker.
    pub async fn mark_started(
        pool: &PgPool,
        task_id: DbId,
        worker_id: DbId,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET status_id = $3, started_at = NOW() \
             WHERE id = $1 AND worker_id = $2 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(worker_id)
            .bind(TaskStatus::Rendering.id())
            .bind(TaskStatus::Claimed.id())
            .fetch_optional(pool)
            .await
    }

    /// Record a successful render with its output path.
    ///
    /// Guarded on Rendering only: Done is not reachable from Claimed, so
    /// a success report that skipped the started report is rejected as
    /// stale.
    pub async fn mark_done(
        pool: &PgPool,
        task_id: DbId,
        worker_id: DbId,
        output_path: &str,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET status_id = $3, output_path = $4, completed_at = NOW() \
             WHERE id = $1 AND worker_id = $2 AND status_id = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(worker_id)
            .bind(TaskStatus::Done.id())
            .bind(output_path)
            .bind(TaskStatus::Rendering.id())
            .fetch_optional(pool)
            .await
    }

    /// Requeue a failed task for another attempt, consuming one retry.
    pub async fn requeue_for_retry(
        pool: &PgPool,
        task_id: DbId,
        worker_id: DbId,
        error_message: &str,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET status_id = $3, worker_id = NULL, claimed_at = NULL, \
                started_at = NULL, retry_count = retry_count + 1, error_message = $4 \
             WHERE id = $1 AND worker_id = $2 AND status_id = ANY($5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(worker_id)
            .bind(TaskStatus::Pending.id())
            .bind(error_message)
            .bind(&IN_FLIGHT_STATUSES[..])
            .fetch_optional(pool)
            .await
    }

    /// Mark a task terminally failed.
    pub async fn mark_error(
        pool: &PgPool,
        task_id: DbId,
        worker_id: DbId,
        error_message: &str,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET status_id = $3, error_message = $4, completed_at = NOW() \
             WHERE id = $1 AND worker_id = $2 AND status_id = ANY($5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(worker_id)
            .bind(TaskStatus::Error.id())
            .bind(error_message)
            .bind(&IN_FLIGHT_STATUSES[..])
            .fetch_optional(pool)
            .await
    }

    // ── Requeue and cancelation sweeps ───────────────────────────────────

    /// Requeue every in-flight task held by a worker.
    ///
    /// Used when the liveness monitor declares the worker offline. Does
    /// not consume a retry: losing a worker is not the task's fault.
    pub async fn requeue_for_worker(
        pool: &PgPool,
        worker_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "UPDATE tasks SET status_id = $2, worker_id = NULL, \
                claimed_at = NULL, started_at = NULL \
             WHERE worker_id = $1 AND status_id = ANY($3) \
             RETURNING id",
        )
        .bind(worker_id)
        .bind(TaskStatus::Pending.id())
        .bind(&IN_FLIGHT_STATUSES[..])
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Fail every still-pending task of a job (fail-fast sibling sweep).
    pub async fn fail_pending_for_job(
        pool: &PgPool,
        job_id: DbId,
        error_message: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE job_id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(TaskStatus::Error.id())
        .bind(error_message)
        .bind(TaskStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Find a task by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List every task of a job in claim order.
    pub async fn list_for_job(pool: &PgPool, job_id: DbId) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE job_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, Task>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    /// Per-status task counts for one job.
    pub async fn counts_for_job(pool: &PgPool, job_id: DbId) -> Result<TaskCounts, sqlx::Error> {
        let row: TaskCountsRow = sqlx::query_as(
            "SELECT \
                COUNT(*) FILTER (WHERE status_id = 1) AS pending, \
                COUNT(*) FILTER (WHERE status_id = 2) AS claimed, \
                COUNT(*) FILTER (WHERE status_id = 3) AS rendering, \
                COUNT(*) FILTER (WHERE status_id = 4) AS done, \
                COUNT(*) FILTER (WHERE status_id = 5) AS error \
             FROM tasks WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_one(pool)
        .await?;
        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_excludes_workers_holding_a_task() {
        // Exclusivity must live inside the claiming statement itself;
        // a separate pre-check races against concurrent claims.
        let sql = TaskRepo::claim_sql();
        assert!(sql.contains("NOT EXISTS"));
        assert!(sql.contains("h.worker_id = $1"));
    }

    #[test]
    fn claim_is_non_blocking_under_contention() {
        assert!(TaskRepo::claim_sql().contains("FOR UPDATE OF t SKIP LOCKED"));
    }
}
