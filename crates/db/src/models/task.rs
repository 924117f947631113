//! Render task entity models and DTOs.
//!
//! Tasks are the unit of work handed to workers. They are created only by
//! job decomposition, never directly through the API.

use helios_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    pub job_id: DbId,
    pub frame: i32,
    /// Tile grid coordinates, NULL for untiled tasks.
    pub tile_col: Option<i32>,
    pub tile_row: Option<i32>,
    /// Tile pixel rect in image coordinates, NULL for untiled tasks.
    pub tile_x: Option<i32>,
    pub tile_y: Option<i32>,
    pub tile_width: Option<i32>,
    pub tile_height: Option<i32>,
    /// Per-task render settings (job settings plus border rewrites).
    pub settings: serde_json::Value,
    pub status_id: StatusId,
    pub worker_id: Option<DbId>,
    pub retry_count: i32,
    /// Path of the rendered output on shared storage, set on success.
    pub output_path: Option<String>,
    pub error_message: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert payload for one task row, built from a decomposition blueprint.
/// The job ID is supplied by the repository inside the submit transaction.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub frame: i32,
    pub tile_col: Option<i32>,
    pub tile_row: Option<i32>,
    pub tile_x: Option<i32>,
    pub tile_y: Option<i32>,
    pub tile_width: Option<i32>,
    pub tile_height: Option<i32>,
    pub settings: serde_json::Value,
}

/// Per-status task counts for one job.
#[derive(Debug, Clone, FromRow)]
pub struct TaskCountsRow {
    pub pending: i64,
    pub claimed: i64,
    pub rendering: i64,
    pub done: i64,
    pub error: i64,
}

impl From<TaskCountsRow> for helios_core::state::TaskCounts {
    fn from(row: TaskCountsRow) -> Self {
        Self {
            pending: row.pending,
            claimed: row.claimed,
            rendering: row.rendering,
            done: row.done,
            error: row.error,
        }
    }
}
