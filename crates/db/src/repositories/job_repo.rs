//! Repository for the `jobs` table.
//!
//! Uses `JobStatus` from `models::status` for all status transitions.
//! No magic numbers: every status literal is a named constant.

use helios_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{Job, JobListQuery, SubmitJob};
use crate::models::status::{JobStatus, StatusId};
use crate::models::task::CreateTask;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, project_id, asset_id, name, status_id, device, \
    frame_start, frame_end, frame_step, tiling, settings, \
    output_pattern, output_path, max_retries, error_message, \
    submitted_at, completed_at, created_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Terminal statuses: done, error, canceled.
const TERMINAL_STATUSES: [StatusId; 3] = [
    JobStatus::Done as StatusId,
    JobStatus::Error as StatusId,
    JobStatus::Canceled as StatusId,
];

/// Provides CRUD operations for render jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a job together with all of its task rows in one transaction.
    ///
    /// The job is inserted as Decomposing, the tasks follow in blueprint
    /// order (so ascending task IDs give FIFO claim order), and the job
    /// flips to Rendering before commit. Either everything lands or
    /// nothing does.
    pub async fn create_with_tasks(
        pool: &PgPool,
        input: &SubmitJob,
        frame_step: i32,
        max_retries: i32,
        settings: &serde_json::Value,
        tasks: &[CreateTask],
    ) -> Result<Job, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let insert = format!(
            "INSERT INTO jobs (project_id, asset_id, name, status_id, device, \
                frame_start, frame_end, frame_step, tiling, settings, \
                output_pattern, max_retries) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&insert)
            .bind(input.project_id)
            .bind(input.asset_id)
            .bind(&input.name)
            .bind(JobStatus::Decomposing.id())
            .bind(&input.device)
            .bind(input.frame_start)
            .bind(input.frame_end)
            .bind(frame_step)
            .bind(&input.tiling)
            .bind(settings)
            .bind(&input.output_pattern)
            .bind(max_retries)
            .fetch_one(&mut *tx)
            .await?;

        for task in tasks {
            sqlx::query(
                "INSERT INTO tasks (job_id, frame, tile_col, tile_row, \
                    tile_x, tile_y, tile_width, tile_height, settings, status_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(job.id)
            .bind(task.frame)
            .bind(task.tile_col)
            .bind(task.tile_row)
            .bind(task.tile_x)
            .bind(task.tile_y)
            .bind(task.tile_width)
            .bind(task.tile_height)
            .bind(&task.settings)
            .bind(crate::models::status::TaskStatus::Pending.id())
            .execute(&mut *tx)
            .await?;
        }

        let promote = format!(
            "UPDATE jobs SET status_id = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&promote)
            .bind(job.id)
            .bind(JobStatus::Rendering.id())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(job)
    }

    /// Find a job by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs, optionally filtered by project and status, newest first.
    pub async fn list(pool: &PgPool, query: &JobListQuery) -> Result<Vec<Job>, sqlx::Error> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = query.offset.unwrap_or(0).max(0);
        let sql = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE ($1::bigint IS NULL OR project_id = $1) \
               AND ($2::smallint IS NULL OR status_id = $2) \
             ORDER BY submitted_at DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Job>(&sql)
            .bind(query.project_id)
            .bind(query.status_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Compare-and-set status transition.
    ///
    /// Returns the updated job only when the row was still in `from`;
    /// `None` means someone else moved it first.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: StatusId,
        to: StatusId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET status_id = $3 \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .fetch_optional(pool)
            .await
    }

    /// Cancel a job unless it is already terminal.
    ///
    /// Returns `None` when the job was terminal (or missing); cancellation
    /// of a finished job is not an error but changes nothing.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND NOT (status_id = ANY($3)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Canceled.id())
            .bind(&TERMINAL_STATUSES[..])
            .fetch_optional(pool)
            .await
    }

    /// Mark a job done with its final deliverable path.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        output_path: &str,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET status_id = $2, output_path = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Done.id())
            .bind(output_path)
            .bind(JobStatus::Assembling.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark a job failed with a reason.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error_message: &str,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND NOT (status_id = ANY($4)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Error.id())
            .bind(error_message)
            .bind(&TERMINAL_STATUSES[..])
            .fetch_optional(pool)
            .await
    }
}
