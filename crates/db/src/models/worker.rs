//! Worker entity models and DTOs.

use helios_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `workers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Worker {
    pub id: DbId,
    /// Unique name; workers re-registering under the same name update
    /// their row instead of creating a new one.
    pub name: String,
    pub hostname: String,
    /// Platform tag matching tool archives, e.g. `linux-x86_64`.
    pub platform: String,
    pub cpu_threads: i32,
    pub gpu_count: i32,
    pub gpu_model: Option<String>,
    pub status_id: StatusId,
    pub last_heartbeat_at: Timestamp,
    pub registered_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a worker via `POST /api/v1/workers`.
#[derive(Debug, Deserialize)]
pub struct RegisterWorker {
    pub name: String,
    pub hostname: String,
    pub platform: String,
    pub cpu_threads: i32,
    pub gpu_count: i32,
    pub gpu_model: Option<String>,
}

/// DTO for `POST /api/v1/workers/{id}/heartbeat`.
#[derive(Debug, Default, Deserialize)]
pub struct WorkerHeartbeat {
    /// Fresh hardware facts; when present they replace the stored ones,
    /// so capability drift (a GPU going away, a platform change) shows
    /// up without waiting for a re-registration.
    pub capabilities: Option<CapabilitySnapshot>,
}

/// Hardware facts a worker reports alongside a heartbeat.
#[derive(Debug, Deserialize)]
pub struct CapabilitySnapshot {
    pub hostname: String,
    pub platform: String,
    pub cpu_threads: i32,
    pub gpu_count: i32,
    pub gpu_model: Option<String>,
}
