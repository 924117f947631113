//! Repository for the `tools` table.

use helios_core::types::DbId;
use sqlx::PgPool;

use crate::models::tool::{CreateTool, Tool};

/// Column list for `tools` queries.
const COLUMNS: &str = "\
    id, engine, version, platform, url, size_bytes, checksum, created_at";

/// Provides CRUD operations for renderer tool archives.
pub struct ToolRepo;

impl ToolRepo {
    /// Register a tool archive. The (engine, version, platform) unique
    /// constraint surfaces as a `23505` database error on duplicates.
    pub async fn create(pool: &PgPool, input: &CreateTool) -> Result<Tool, sqlx::Error> {
        let query = format!(
            "INSERT INTO tools (engine, version, platform, url, size_bytes, checksum) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tool>(&query)
            .bind(&input.engine)
            .bind(&input.version)
            .bind(&input.platform)
            .bind(&input.url)
            .bind(input.size_bytes)
            .bind(&input.checksum)
            .fetch_one(pool)
            .await
    }

    /// Find a tool by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Tool>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tools WHERE id = $1");
        sqlx::query_as::<_, Tool>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Look up the archive for one engine/version/platform combination.
    pub async fn find_by_key(
        pool: &PgPool,
        engine: &str,
        version: &str,
        platform: &str,
    ) -> Result<Option<Tool>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tools \
             WHERE engine = $1 AND version = $2 AND platform = $3"
        );
        sqlx::query_as::<_, Tool>(&query)
            .bind(engine)
            .bind(version)
            .bind(platform)
            .fetch_optional(pool)
            .await
    }

    /// List the full tool catalog, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Tool>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tools ORDER BY created_at DESC");
        sqlx::query_as::<_, Tool>(&query).fetch_all(pool).await
    }
}
