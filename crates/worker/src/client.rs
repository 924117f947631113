//! HTTP client for the manager's worker-facing API.
//!
//! Wraps the manager REST endpoints (registration, heartbeat, claiming,
//! progress reports, catalog lookups) using [`reqwest`]. Responses arrive
//! in a `{ "data": ... }` envelope; errors as `{ "error", "code" }` with a
//! non-2xx status.

use helios_core::types::DbId;
use serde::Deserialize;

use crate::capability::HostCapabilities;
use crate::error::WorkerError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Envelope every manager response body uses.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Worker row as the manager serves it.
#[derive(Debug, Clone, Deserialize)]
pub struct Worker {
    pub id: DbId,
    pub name: String,
    pub gpu_count: i32,
    pub status_id: i16,
}

/// Task row as the manager serves it.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: DbId,
    pub job_id: DbId,
    pub frame: i32,
    pub tile_col: Option<i32>,
    pub tile_row: Option<i32>,
    /// Flat string map of render settings, border keys already rewritten
    /// per tile.
    pub settings: serde_json::Value,
    pub retry_count: i32,
}

/// Job row as the manager serves it.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: DbId,
    pub asset_id: DbId,
    pub name: String,
    /// Requested device class: `CPU`, `GPU`, or `ANY`.
    pub device: String,
    pub output_pattern: String,
}

/// Asset row as the manager serves it.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub id: DbId,
    pub name: String,
    /// Path on shared storage, resolvable by every worker.
    pub path: String,
    pub checksum: String,
}

/// Tool catalog row as the manager serves it.
#[derive(Debug, Clone, Deserialize)]
pub struct Tool {
    pub id: DbId,
    pub engine: String,
    pub version: String,
    pub platform: String,
    pub url: String,
    pub checksum: String,
}

impl Tool {
    /// Cache key this tool is stored under locally.
    pub fn cache_key(&self) -> String {
        format!("{}-{}-{}", self.engine, self.version, self.platform)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for one manager instance.
#[derive(Clone)]
pub struct ManagerClient {
    client: reqwest::Client,
    base_url: String,
}

impl ManagerClient {
    /// Create a client for the manager at `base_url`, e.g. `http://host:3000`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    // ── Registration and liveness ──────────────────────────────────────────

    /// Register (or re-register) this worker. Upsert on the manager side,
    /// so it is safe to call on every startup.
    pub async fn register(
        &self,
        name: &str,
        caps: &HostCapabilities,
    ) -> Result<Worker, WorkerError> {
        let mut body = Self::capability_fields(caps);
        body["name"] = serde_json::json!(name);

        let response = self
            .client
            .post(self.url("/workers"))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Send a heartbeat carrying the current capability snapshot, so the
    /// manager tracks hardware drift on live workers. A 404 means the
    /// manager forgot this worker and it must re-register.
    pub async fn heartbeat(
        &self,
        worker_id: DbId,
        caps: &HostCapabilities,
    ) -> Result<Worker, WorkerError> {
        let body = serde_json::json!({
            "capabilities": Self::capability_fields(caps),
        });

        let response = self
            .client
            .post(self.url(&format!("/workers/{worker_id}/heartbeat")))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Hardware facts as the manager's worker DTOs expect them.
    fn capability_fields(caps: &HostCapabilities) -> serde_json::Value {
        serde_json::json!({
            "hostname": caps.hostname,
            "platform": caps.platform,
            "cpu_threads": caps.cpu_threads,
            "gpu_count": caps.gpu_count,
            "gpu_model": caps.gpu_model,
        })
    }

    // ── Task protocol ──────────────────────────────────────────────────────

    /// Ask for the next runnable task. `None` when the queue has nothing
    /// for this worker.
    pub async fn claim(&self, worker_id: DbId) -> Result<Option<Task>, WorkerError> {
        let body = serde_json::json!({ "worker_id": worker_id });

        let response = self
            .client
            .post(self.url("/tasks/claim"))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Report that the render process launched.
    pub async fn report_started(&self, task_id: DbId, worker_id: DbId) -> Result<(), WorkerError> {
        self.report(task_id, serde_json::json!({
            "worker_id": worker_id,
            "outcome": "started",
        }))
        .await
    }

    /// Report a finished render and where its output landed.
    pub async fn report_succeeded(
        &self,
        task_id: DbId,
        worker_id: DbId,
        output_path: &str,
    ) -> Result<(), WorkerError> {
        self.report(task_id, serde_json::json!({
            "worker_id": worker_id,
            "outcome": "succeeded",
            "output_path": output_path,
        }))
        .await
    }

    /// Report a failed render.
    pub async fn report_failed(
        &self,
        task_id: DbId,
        worker_id: DbId,
        reason: &str,
    ) -> Result<(), WorkerError> {
        self.report(task_id, serde_json::json!({
            "worker_id": worker_id,
            "outcome": "failed",
            "reason": reason,
        }))
        .await
    }

    async fn report(&self, task_id: DbId, body: serde_json::Value) -> Result<(), WorkerError> {
        let response = self
            .client
            .post(self.url(&format!("/tasks/{task_id}/report")))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    // ── Catalog lookups ────────────────────────────────────────────────────

    /// Fetch a job by ID.
    pub async fn get_job(&self, job_id: DbId) -> Result<Job, WorkerError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{job_id}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch an asset by ID.
    pub async fn get_asset(&self, asset_id: DbId) -> Result<Asset, WorkerError> {
        let response = self
            .client
            .get(self.url(&format!("/assets/{asset_id}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the full tool catalog.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, WorkerError> {
        let response = self.client.get(self.url("/tools")).send().await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`WorkerError::Api`] with the
    /// status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, WorkerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(WorkerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful enveloped JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, WorkerError> {
        let response = Self::ensure_success(response).await?;
        let envelope = response.json::<DataEnvelope<T>>().await?;
        Ok(envelope.data)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), WorkerError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

impl WorkerError {
    /// Whether this error is a manager 404, i.e. "re-register and retry".
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkerError::Api { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> HostCapabilities {
        HostCapabilities {
            hostname: "render-07".to_string(),
            platform: "linux-x86_64".to_string(),
            cpu_threads: 32,
            gpu_count: 1,
            gpu_model: Some("RTX 4090".to_string()),
        }
    }

    #[test]
    fn capability_fields_cover_all_hardware_facts() {
        let body = ManagerClient::capability_fields(&caps());
        assert_eq!(body["hostname"], "render-07");
        assert_eq!(body["platform"], "linux-x86_64");
        assert_eq!(body["cpu_threads"], 32);
        assert_eq!(body["gpu_count"], 1);
        assert_eq!(body["gpu_model"], "RTX 4090");
    }

    #[test]
    fn tool_cache_key_combines_engine_version_platform() {
        let tool = Tool {
            id: 1,
            engine: "blender".to_string(),
            version: "4.2.1".to_string(),
            platform: "linux-x86_64".to_string(),
            url: String::new(),
            checksum: String::new(),
        };
        assert_eq!(tool.cache_key(), "blender-4.2.1-linux-x86_64");
    }
}
