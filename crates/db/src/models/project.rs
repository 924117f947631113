//! Project entity models and DTOs.

use helios_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    /// Paused projects keep their jobs but no new tasks are handed out.
    pub is_paused: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a project via `POST /api/v1/projects`.
#[derive(Debug, Deserialize)]
pub struct CreateProject {
    pub name: String,
}

/// DTO for `PATCH /api/v1/projects/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub is_paused: Option<bool>,
}
