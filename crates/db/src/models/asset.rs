//! Scene asset entity models and DTOs.
//!
//! An asset is a scene file (e.g. a `.blend`) uploaded to shared storage
//! that jobs reference as their render input.

use helios_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Asset {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    /// Path on shared storage, resolvable by every worker.
    pub path: String,
    pub size_bytes: i64,
    /// SHA-256 hex digest of the file contents.
    pub checksum: String,
    pub created_at: Timestamp,
}

/// DTO for registering an asset via `POST /api/v1/assets`.
#[derive(Debug, Deserialize)]
pub struct CreateAsset {
    pub project_id: DbId,
    pub name: String,
    pub path: String,
    pub size_bytes: i64,
    pub checksum: String,
}
