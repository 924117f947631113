//! Repository for the `workers` table.

use helios_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::status::WorkerStatus;
use crate::models::worker::{CapabilitySnapshot, RegisterWorker, Worker};

/// Column list for `workers` queries.
const COLUMNS: &str = "\
    id, name, hostname, platform, cpu_threads, gpu_count, gpu_model, \
    status_id, last_heartbeat_at, registered_at, created_at, updated_at";

/// Provides registration, heartbeat, and liveness operations for workers.
pub struct WorkerRepo;

impl WorkerRepo {
    // ── Registration ─────────────────────────────────────────────────────

    /// Register a worker, or refresh its row on name conflict (upsert).
    ///
    /// A worker restarting under the same name updates its hardware facts
    /// and comes back Active with a fresh heartbeat.
    pub async fn register(pool: &PgPool, input: &RegisterWorker) -> Result<Worker, sqlx::Error> {
        let query = format!(
            "INSERT INTO workers (name, hostname, platform, cpu_threads, gpu_count, \
                gpu_model, status_id, last_heartbeat_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) \
             ON CONFLICT (name) DO UPDATE SET \
                hostname = EXCLUDED.hostname, \
                platform = EXCLUDED.platform, \
                cpu_threads = EXCLUDED.cpu_threads, \
                gpu_count = EXCLUDED.gpu_count, \
                gpu_model = EXCLUDED.gpu_model, \
                status_id = EXCLUDED.status_id, \
                last_heartbeat_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Worker>(&query)
            .bind(&input.name)
            .bind(&input.hostname)
            .bind(&input.platform)
            .bind(input.cpu_threads)
            .bind(input.gpu_count)
            .bind(&input.gpu_model)
            .bind(WorkerStatus::Active.id())
            .fetch_one(pool)
            .await
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Find a worker by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Worker>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers WHERE id = $1");
        sqlx::query_as::<_, Worker>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all workers ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Worker>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers ORDER BY name ASC");
        sqlx::query_as::<_, Worker>(&query).fetch_all(pool).await
    }

    // ── Liveness ─────────────────────────────────────────────────────────

    /// Record a heartbeat. Any heartbeat makes the worker Active again;
    /// a capability snapshot, when sent, replaces the stored hardware
    /// facts.
    ///
    /// `$3` doubles as the snapshot-presence flag: the snapshot's fields
    /// are all bound or all NULL together.
    pub async fn heartbeat(
        pool: &PgPool,
        id: DbId,
        caps: Option<&CapabilitySnapshot>,
    ) -> Result<Option<Worker>, sqlx::Error> {
        let query = format!(
            "UPDATE workers SET last_heartbeat_at = NOW(), status_id = $2, \
                hostname = COALESCE($3, hostname), \
                platform = COALESCE($4, platform), \
                cpu_threads = COALESCE($5, cpu_threads), \
                gpu_count = COALESCE($6, gpu_count), \
                gpu_model = CASE WHEN $3 IS NULL THEN gpu_model ELSE $7 END \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Worker>(&query)
            .bind(id)
            .bind(WorkerStatus::Active.id())
            .bind(caps.map(|c| c.hostname.as_str()))
            .bind(caps.map(|c| c.platform.as_str()))
            .bind(caps.map(|c| c.cpu_threads))
            .bind(caps.map(|c| c.gpu_count))
            .bind(caps.and_then(|c| c.gpu_model.as_deref()))
            .fetch_optional(pool)
            .await
    }

    /// Mark Active workers with no heartbeat since `cutoff` as Stale.
    /// Returns the affected workers.
    pub async fn mark_stale(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<Worker>, sqlx::Error> {
        let query = format!(
            "UPDATE workers SET status_id = $2 \
             WHERE status_id = $3 AND last_heartbeat_at < $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Worker>(&query)
            .bind(cutoff)
            .bind(WorkerStatus::Stale.id())
            .bind(WorkerStatus::Active.id())
            .fetch_all(pool)
            .await
    }

    /// Mark non-Offline workers with no heartbeat since `cutoff` as
    /// Offline. Returns the affected workers so their tasks can be
    /// requeued.
    pub async fn mark_offline(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<Worker>, sqlx::Error> {
        let query = format!(
            "UPDATE workers SET status_id = $2 \
             WHERE status_id <> $2 AND last_heartbeat_at < $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Worker>(&query)
            .bind(cutoff)
            .bind(WorkerStatus::Offline.id())
            .fetch_all(pool)
            .await
    }
}
