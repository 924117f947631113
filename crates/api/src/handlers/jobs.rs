//! Handlers for the `/jobs` resource.
//!
//! Submission is where decomposition happens: the job is validated, split
//! into task blueprints, and the job plus every task row is created in a
//! single transaction. A submission either lands whole or not at all.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use helios_core::capability::RenderDevice;
use helios_core::decompose::{self, FrameRange, TaskBlueprint, TilingConfig};
use helios_core::error::CoreError;
use helios_core::settings::{self, RenderSettings};
use helios_core::state::DEFAULT_MAX_RETRIES;
use helios_core::types::DbId;
use helios_db::models::job::{JobListQuery, SubmitJob};
use helios_db::models::task::CreateTask;
use helios_db::repositories::{AssetRepo, JobRepo, ProjectRepo, TaskRepo};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a JSON settings object into the flat string map the domain layer
/// works with. Only string values are accepted; numbers must be sent as
/// strings so that no renderer-specific coercion happens here.
fn settings_map(value: &serde_json::Value) -> Result<RenderSettings, AppError> {
    let object = value.as_object().ok_or_else(|| {
        AppError::Core(CoreError::Validation(
            "Settings must be a JSON object".to_string(),
        ))
    })?;

    let mut map = RenderSettings::new();
    for (key, value) in object {
        let value = value.as_str().ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Settings key {key} must have a string value"
            )))
        })?;
        map.insert(key.clone(), value.to_string());
    }
    Ok(map)
}

/// Convert a decomposition blueprint into a task insert payload.
fn blueprint_to_task(bp: &TaskBlueprint) -> Result<CreateTask, AppError> {
    let settings = serde_json::to_value(&bp.settings)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize task settings: {e}")))?;
    Ok(CreateTask {
        frame: bp.frame,
        tile_col: bp.tile.map(|t| t.col as i32),
        tile_row: bp.tile.map(|t| t.row as i32),
        tile_x: bp.tile.map(|t| t.rect.x as i32),
        tile_y: bp.tile.map(|t| t.rect.y as i32),
        tile_width: bp.tile.map(|t| t.rect.width as i32),
        tile_height: bp.tile.map(|t| t.rect.height as i32),
        settings,
    })
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Submit a render job. Returns 201 with the job already decomposed into
/// tasks and in Rendering status.
pub async fn submit(
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    // Referential checks first so the error names the missing entity.
    ProjectRepo::find_by_id(&state.pool, input.project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: input.project_id,
        }))?;
    let asset = AssetRepo::find_by_id(&state.pool, input.asset_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Asset",
            id: input.asset_id,
        }))?;
    if asset.project_id != input.project_id {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Asset {} belongs to a different project",
            asset.id
        ))));
    }

    if input.name.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Job name must not be empty".to_string(),
        )));
    }
    if input.output_pattern.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Output pattern must not be empty".to_string(),
        )));
    }

    input.device.parse::<RenderDevice>()?;

    let frame_step = input.frame_step.unwrap_or(1);
    let frames = FrameRange::new(input.frame_start, input.frame_end, frame_step)?;

    let tiling = input
        .tiling
        .as_deref()
        .map(str::parse::<TilingConfig>)
        .transpose()?;

    let default_settings = serde_json::json!({});
    let settings_json = input.settings.as_ref().unwrap_or(&default_settings);
    let base_settings = settings_map(settings_json)?;
    settings::validate_settings(&base_settings)?;

    let blueprints = decompose::decompose(&frames, tiling, &base_settings)?;
    let tasks: Vec<CreateTask> = blueprints
        .iter()
        .map(blueprint_to_task)
        .collect::<Result<_, _>>()?;

    let max_retries = input.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
    if max_retries < 0 {
        return Err(AppError::Core(CoreError::Validation(
            "max_retries must not be negative".to_string(),
        )));
    }

    let job = JobRepo::create_with_tasks(
        &state.pool,
        &input,
        frame_step,
        max_retries,
        settings_json,
        &tasks,
    )
    .await?;

    tracing::info!(
        job_id = job.id,
        project_id = job.project_id,
        task_count = tasks.len(),
        tiled = tiling.is_some(),
        "Job submitted and decomposed",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/jobs/{id}/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    JobRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?;
    let tasks = TaskRepo::list_for_job(&state.pool, id).await?;
    Ok(Json(DataResponse { data: tasks }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Cancel a job. In-flight tasks are not interrupted, but their reports
/// change nothing and pending siblings are never claimed (the claim query
/// only hands out tasks of rendering jobs). Canceling an already terminal
/// job is an idempotent no-op returning the job unchanged.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?;

    if helios_core::state::job::is_terminal(job.status_id) {
        return Ok(Json(DataResponse { data: job }));
    }

    match JobRepo::cancel(&state.pool, id).await? {
        Some(canceled) => {
            tracing::info!(job_id = id, "Job canceled");
            Ok(Json(DataResponse { data: canceled }))
        }
        // Lost a race with completion or another cancel; report current state.
        None => {
            let job = JobRepo::find_by_id(&state.pool, id).await?.ok_or(
                AppError::Core(CoreError::NotFound { entity: "Job", id }),
            )?;
            Ok(Json(DataResponse { data: job }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use helios_core::decompose::{Tile, TileRect};

    #[test]
    fn settings_map_accepts_string_values() {
        let json = serde_json::json!({"render.engine": "CYCLES", "cycles.samples": "64"});
        let map = settings_map(&json).unwrap();
        assert_eq!(map["render.engine"], "CYCLES");
        assert_eq!(map["cycles.samples"], "64");
    }

    #[test]
    fn settings_map_rejects_non_object() {
        let json = serde_json::json!(["render.engine"]);
        assert_matches!(settings_map(&json), Err(AppError::Core(CoreError::Validation(_))));
    }

    #[test]
    fn settings_map_rejects_numeric_values() {
        let json = serde_json::json!({"cycles.samples": 64});
        assert_matches!(settings_map(&json), Err(AppError::Core(CoreError::Validation(_))));
    }

    #[test]
    fn blueprint_conversion_keeps_tile_rect() {
        let bp = TaskBlueprint {
            frame: 3,
            tile: Some(Tile {
                col: 1,
                row: 0,
                rect: TileRect { x: 960, y: 0, width: 960, height: 540 },
            }),
            settings: RenderSettings::new(),
        };
        let task = blueprint_to_task(&bp).unwrap();
        assert_eq!(task.frame, 3);
        assert_eq!(task.tile_col, Some(1));
        assert_eq!(task.tile_x, Some(960));
        assert_eq!(task.tile_height, Some(540));
    }

    #[test]
    fn blueprint_conversion_untiled_is_all_null() {
        let bp = TaskBlueprint {
            frame: 1,
            tile: None,
            settings: RenderSettings::new(),
        };
        let task = blueprint_to_task(&bp).unwrap();
        assert_eq!(task.tile_col, None);
        assert_eq!(task.tile_width, None);
    }
}
