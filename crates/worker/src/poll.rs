//! Main worker loop: heartbeat, claim, render, report.
//!
//! The agent registers on startup, then runs two loops until cancelled: a
//! heartbeat pushed every `HEARTBEAT_INTERVAL_SECS` on its own task (so a
//! long render never starves liveness), and a claim loop that polls for
//! work, renders it, and reports the outcome.

use std::time::Duration;

use helios_core::capability::RenderDevice;
use helios_core::settings::RenderSettings;
use helios_core::state::HEARTBEAT_INTERVAL_SECS;
use helios_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::capability::{self, HostCapabilities};
use crate::client::{ManagerClient, Task, Tool, Worker};
use crate::config::WorkerConfig;
use crate::engine;
use crate::error::WorkerError;
use crate::tool_cache::ToolCache;

/// Engine family the farm currently drives.
const TOOL_ENGINE: &str = "blender";

/// The worker agent: one per host.
pub struct WorkerAgent {
    config: WorkerConfig,
    caps: HostCapabilities,
    client: ManagerClient,
    cache: ToolCache,
}

impl WorkerAgent {
    /// Probe the host and build an agent from configuration.
    pub fn new(config: WorkerConfig) -> Self {
        let caps = capability::detect();
        let client = ManagerClient::new(config.manager_url.clone());
        let cache = ToolCache::new(config.cache_dir.clone());
        Self {
            config,
            caps,
            client,
            cache,
        }
    }

    /// Register, then run the heartbeat and claim loops until the
    /// cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), WorkerError> {
        let worker = self.register().await?;
        tracing::info!(
            worker_id = worker.id,
            name = %worker.name,
            cpu_threads = self.caps.cpu_threads,
            gpu_count = self.caps.gpu_count,
            "Worker registered",
        );

        let heartbeat_handle = tokio::spawn(heartbeat_loop(
            self.client.clone(),
            worker.id,
            self.config.worker_name.clone(),
            self.caps.clone(),
            cancel.child_token(),
        ));

        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.claim_poll_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.client.claim(worker.id).await {
                        Ok(Some(task)) => {
                            self.execute(&worker, task).await;
                            // More work may be queued; skip the idle wait.
                            ticker.reset_immediately();
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "Claim attempt failed");
                        }
                    }
                }
            }
        }

        let _ = heartbeat_handle.await;
        Ok(())
    }

    /// Register this host with the manager (upsert by name).
    async fn register(&self) -> Result<Worker, WorkerError> {
        self.client
            .register(&self.config.worker_name, &self.caps)
            .await
    }

    /// Run one claimed task end to end and report the outcome.
    ///
    /// Every failure path reports back to the manager so the task's
    /// retry budget is consumed there, never silently dropped here.
    async fn execute(&self, worker: &Worker, task: Task) {
        tracing::info!(task_id = task.id, job_id = task.job_id, frame = task.frame, "Task claimed");

        if let Err(e) = self.client.report_started(task.id, worker.id).await {
            tracing::error!(task_id = task.id, error = %e, "Failed to report start");
            return;
        }

        match self.render_task(&task).await {
            Ok(output_path) => {
                tracing::info!(task_id = task.id, output = %output_path, "Task finished");
                if let Err(e) = self
                    .client
                    .report_succeeded(task.id, worker.id, &output_path)
                    .await
                {
                    tracing::error!(task_id = task.id, error = %e, "Failed to report success");
                }
            }
            Err(e) => {
                tracing::error!(task_id = task.id, error = %e, "Task failed");
                if let Err(report_err) = self
                    .client
                    .report_failed(task.id, worker.id, &e.to_string())
                    .await
                {
                    tracing::error!(task_id = task.id, error = %report_err, "Failed to report failure");
                }
            }
        }
    }

    /// Fetch everything a task needs and render it.
    async fn render_task(&self, task: &Task) -> Result<String, WorkerError> {
        let job = self.client.get_job(task.job_id).await?;
        let asset = self.client.get_asset(job.asset_id).await?;
        let device: RenderDevice = job.device.parse()?;

        let tool = self.select_tool().await?;
        let executable = self.cache.ensure(&tool).await?;

        let settings = task_settings(&task.settings)?;

        let out_dir = self.config.work_dir.join("tasks").join(task.id.to_string());
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| WorkerError::io(&out_dir, e))?;

        let plan = engine::build_plan(
            executable,
            &asset.path,
            &out_dir,
            task.frame,
            &settings,
            device,
            self.caps.gpu_count,
        );

        let output = engine::run_render(&plan, self.config.render_timeout_secs).await?;
        Ok(output.to_string_lossy().into_owned())
    }

    /// Pick the newest catalog tool for this host's platform.
    async fn select_tool(&self) -> Result<Tool, WorkerError> {
        let mut tools: Vec<Tool> = self
            .client
            .list_tools()
            .await?
            .into_iter()
            .filter(|t| t.engine == TOOL_ENGINE && t.platform == self.caps.platform)
            .collect();

        tools.sort_by_key(|t| version_key(&t.version));
        tools.pop().ok_or_else(|| {
            WorkerError::Render(format!(
                "No {TOOL_ENGINE} tool in the catalog for platform {}",
                self.caps.platform
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Heartbeat loop
// ---------------------------------------------------------------------------

/// Push heartbeats until cancelled. A 404 means the manager no longer
/// knows this worker, so re-register and carry on.
async fn heartbeat_loop(
    client: ManagerClient,
    worker_id: DbId,
    name: String,
    caps: HostCapabilities,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Heartbeat loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                match client.heartbeat(worker_id, &caps).await {
                    Ok(_) => {
                        tracing::debug!(worker_id, "Heartbeat sent");
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::warn!(worker_id, "Manager forgot this worker, re-registering");
                        if let Err(e) = client.register(&name, &caps).await {
                            tracing::error!(error = %e, "Re-registration failed");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Heartbeat failed");
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sort key for dotted version strings, so `4.10.0` outranks `4.9.0`.
/// Non-numeric components compare as zero.
fn version_key(version: &str) -> Vec<u64> {
    version
        .split(['.', '-'])
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

/// Decode the per-task settings object into a flat string map.
fn task_settings(value: &serde_json::Value) -> Result<RenderSettings, WorkerError> {
    let object = value.as_object().ok_or_else(|| {
        WorkerError::Render("Task settings are not a JSON object".to_string())
    })?;

    let mut settings = RenderSettings::new();
    for (key, value) in object {
        let value = value.as_str().ok_or_else(|| {
            WorkerError::Render(format!("Task setting {key} is not a string"))
        })?;
        settings.insert(key.clone(), value.to_string());
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn version_key_orders_numerically() {
        assert!(version_key("4.10.0") > version_key("4.9.0"));
        assert!(version_key("4.2.1") > version_key("4.2"));
        assert!(version_key("5.0") > version_key("4.99.9"));
    }

    #[test]
    fn task_settings_decodes_string_map() {
        let value = serde_json::json!({
            "render.engine": "CYCLES",
            "cycles.samples": "64",
        });
        let settings = task_settings(&value).unwrap();
        assert_eq!(settings["render.engine"], "CYCLES");
        assert_eq!(settings.len(), 2);
    }

    #[test]
    fn task_settings_rejects_non_string_values() {
        let value = serde_json::json!({ "cycles.samples": 64 });
        assert_matches!(task_settings(&value), Err(WorkerError::Render(_)));
    }

    #[test]
    fn task_settings_rejects_non_object() {
        assert_matches!(
            task_settings(&serde_json::json!([1, 2])),
            Err(WorkerError::Render(_))
        );
    }
}
