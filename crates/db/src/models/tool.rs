//! Renderer tool entity models and DTOs.
//!
//! A tool row describes one downloadable renderer archive, keyed by
//! engine, version, and platform. Workers fetch this catalog to populate
//! their local tool cache.

use helios_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `tools` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tool {
    pub id: DbId,
    /// Engine family, e.g. `blender`.
    pub engine: String,
    pub version: String,
    /// Target platform, e.g. `linux-x86_64`.
    pub platform: String,
    /// URL the archive can be downloaded from.
    pub url: String,
    pub size_bytes: i64,
    /// SHA-256 hex digest of the archive.
    pub checksum: String,
    pub created_at: Timestamp,
}

impl Tool {
    /// Cache key a worker stores this tool under.
    pub fn cache_key(&self) -> String {
        format!("{}-{}-{}", self.engine, self.version, self.platform)
    }
}

/// DTO for registering a tool via `POST /api/v1/tools`.
#[derive(Debug, Deserialize)]
pub struct CreateTool {
    pub engine: String,
    pub version: String,
    pub platform: String,
    pub url: String,
    pub size_bytes: i64,
    pub checksum: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_joins_engine_version_platform() {
        let tool = Tool {
            id: 1,
            engine: "blender".to_string(),
            version: "4.2.1".to_string(),
            platform: "linux-x86_64".to_string(),
            url: "https://mirror.example/blender-4.2.1.tar.xz".to_string(),
            size_bytes: 0,
            checksum: String::new(),
            created_at: chrono::Utc::now(),
        };
        assert_eq!(tool.cache_key(), "blender-4.2.1-linux-x86_64");
    }
}
