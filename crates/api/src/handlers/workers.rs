//! Handlers for the `/workers` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use helios_core::error::CoreError;
use helios_core::types::DbId;
use helios_db::models::worker::{RegisterWorker, WorkerHeartbeat};
use helios_db::repositories::WorkerRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/workers
///
/// Register a worker, or refresh its row when the name already exists.
/// Registration doubles as the recovery path after a manager or worker
/// restart, so it is deliberately an upsert.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterWorker>,
) -> AppResult<impl IntoResponse> {
    if input.name.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Worker name must not be empty".to_string(),
        )));
    }
    if input.cpu_threads < 1 {
        return Err(AppError::Core(CoreError::Validation(
            "Worker must report at least one CPU thread".to_string(),
        )));
    }
    if input.gpu_count < 0 {
        return Err(AppError::Core(CoreError::Validation(
            "GPU count must not be negative".to_string(),
        )));
    }

    let worker = WorkerRepo::register(&state.pool, &input).await?;
    tracing::info!(
        worker_id = worker.id,
        name = %worker.name,
        gpu_count = worker.gpu_count,
        "Worker registered",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: worker })))
}

/// GET /api/v1/workers
pub async fn list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let workers = WorkerRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: workers }))
}

/// GET /api/v1/workers/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let worker = WorkerRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Worker",
            id,
        }))?;
    Ok(Json(DataResponse { data: worker }))
}

/// POST /api/v1/workers/{id}/heartbeat
///
/// Record a heartbeat. Any heartbeat makes the worker Active again; an
/// unknown ID gets 404, telling the worker to re-register. The body may
/// carry a capability snapshot, which refreshes the stored hardware
/// facts of a live worker.
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<WorkerHeartbeat>>,
) -> AppResult<impl IntoResponse> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let worker = WorkerRepo::heartbeat(&state.pool, id, input.capabilities.as_ref())
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Worker",
            id,
        }))?;
    Ok(Json(DataResponse { data: worker }))
}
