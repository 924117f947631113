//! Handlers for the `/tasks` resource: the worker protocol.
//!
//! Claiming is a single atomic compare-and-set in the repository. Reports
//! are guarded by reporter and expected status, so a report from a worker
//! whose claim was requeued in the meantime changes nothing and returns
//! `data: null` instead of an error.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use helios_core::error::CoreError;
use helios_core::types::DbId;
use helios_db::models::status::WorkerStatus;
use helios_db::repositories::{JobRepo, TaskRepo, WorkerRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::lifecycle;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Body of `POST /tasks/claim`.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub worker_id: DbId,
}

/// Body of `POST /tasks/{id}/report`.
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub worker_id: DbId,
    #[serde(flatten)]
    pub outcome: ReportOutcome,
}

/// What the worker has to say about its task.
#[derive(Debug, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReportOutcome {
    /// The render process launched.
    Started,
    /// The render finished; output is at `output_path` on shared storage.
    Succeeded { output_path: String },
    /// The render failed; `reason` is surfaced in task and job errors.
    Failed { reason: String },
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// POST /api/v1/tasks/claim
///
/// Hand the worker the oldest pending task it can run, or `data: null`
/// when nothing is runnable. A worker holds at most one task at a time;
/// claiming with one still in flight is a 409.
pub async fn claim(
    State(state): State<AppState>,
    Json(input): Json<ClaimRequest>,
) -> AppResult<impl IntoResponse> {
    let worker = WorkerRepo::find_by_id(&state.pool, input.worker_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Worker",
            id: input.worker_id,
        }))?;

    // Stale and offline workers stop receiving work; a heartbeat makes
    // them Active again and keeps status and tasks consistent.
    if !worker_may_claim(worker.status_id) {
        return Err(AppError::Core(CoreError::Conflict(
            "Worker is not active; send a heartbeat before claiming".to_string(),
        )));
    }

    if let Some(active) = TaskRepo::find_active_for_worker(&state.pool, worker.id).await? {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Worker already holds task {}",
            active.id
        ))));
    }

    let claimed = TaskRepo::claim_next(&state.pool, worker.id, worker.gpu_count).await?;
    if let Some(task) = &claimed {
        tracing::info!(
            task_id = task.id,
            job_id = task.job_id,
            frame = task.frame,
            worker_id = worker.id,
            "Task claimed",
        );
    }
    Ok(Json(DataResponse { data: claimed }))
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// POST /api/v1/tasks/{id}/report
///
/// Apply a worker's progress report. Stale reports (the task was requeued
/// or finished by someone else) are acknowledged with `data: null`.
pub async fn report(
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
    Json(input): Json<ReportRequest>,
) -> AppResult<impl IntoResponse> {
    let task = TaskRepo::find_by_id(&state.pool, task_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Task",
            id: task_id,
        }))?;

    let updated = match &input.outcome {
        ReportOutcome::Started => {
            TaskRepo::mark_started(&state.pool, task_id, input.worker_id).await?
        }

        ReportOutcome::Succeeded { output_path } => {
            let updated =
                TaskRepo::mark_done(&state.pool, task_id, input.worker_id, output_path).await?;
            if let Some(task) = &updated {
                tracing::info!(task_id, job_id = task.job_id, "Task succeeded");
                lifecycle::on_task_settled(&state, task.job_id).await?;
            }
            updated
        }

        ReportOutcome::Failed { reason } => {
            let job = JobRepo::find_by_id(&state.pool, task.job_id).await?.ok_or(
                AppError::Core(CoreError::NotFound {
                    entity: "Job",
                    id: task.job_id,
                }),
            )?;

            let updated = if task.retry_count < job.max_retries {
                let requeued =
                    TaskRepo::requeue_for_retry(&state.pool, task_id, input.worker_id, reason)
                        .await?;
                if let Some(task) = &requeued {
                    tracing::warn!(
                        task_id,
                        job_id = task.job_id,
                        retry_count = task.retry_count,
                        max_retries = job.max_retries,
                        reason,
                        "Task failed, requeued",
                    );
                }
                requeued
            } else {
                let failed =
                    TaskRepo::mark_error(&state.pool, task_id, input.worker_id, reason).await?;
                if let Some(task) = &failed {
                    tracing::error!(task_id, job_id = task.job_id, reason, "Task failed terminally");
                    lifecycle::on_task_settled(&state, task.job_id).await?;
                }
                failed
            };
            updated
        }
    };

    if updated.is_none() {
        tracing::debug!(
            task_id,
            worker_id = input.worker_id,
            "Stale task report ignored",
        );
    }
    Ok(Json(DataResponse { data: updated }))
}

/// Only Active workers hand out claims.
fn worker_may_claim(status_id: helios_db::models::status::StatusId) -> bool {
    status_id == WorkerStatus::Active.id()
}

/// GET /api/v1/tasks/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let task = TaskRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Task", id }))?;
    Ok(Json(DataResponse { data: task }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_workers_may_claim() {
        assert!(worker_may_claim(WorkerStatus::Active.id()));
        assert!(!worker_may_claim(WorkerStatus::Stale.id()));
        assert!(!worker_may_claim(WorkerStatus::Offline.id()));
    }
}
