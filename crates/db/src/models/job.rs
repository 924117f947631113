//! Render job entity models and DTOs.

use helios_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub project_id: DbId,
    pub asset_id: DbId,
    pub name: String,
    pub status_id: StatusId,
    /// Requested device class: `CPU`, `GPU`, or `ANY`.
    pub device: String,
    pub frame_start: i32,
    pub frame_end: i32,
    pub frame_step: i32,
    /// Tile grid in `COLSxROWS` form, NULL for untiled jobs.
    pub tiling: Option<String>,
    /// Namespaced render settings as a flat JSON object.
    pub settings: serde_json::Value,
    /// Output filename pattern, `#` runs substituted per frame.
    pub output_pattern: String,
    /// Final deliverable path, set by the assembler.
    pub output_path: Option<String>,
    pub max_retries: i32,
    pub error_message: Option<String>,
    pub submitted_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for submitting a job via `POST /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct SubmitJob {
    pub project_id: DbId,
    pub asset_id: DbId,
    pub name: String,
    pub device: String,
    pub frame_start: i32,
    pub frame_end: i32,
    /// Defaults to 1.
    pub frame_step: Option<i32>,
    pub tiling: Option<String>,
    /// Defaults to an empty settings map.
    pub settings: Option<serde_json::Value>,
    pub output_pattern: String,
    /// Defaults to `DEFAULT_MAX_RETRIES`.
    pub max_retries: Option<i32>,
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub project_id: Option<DbId>,
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
