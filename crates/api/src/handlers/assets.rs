//! Handlers for the `/assets` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use helios_core::error::CoreError;
use helios_core::types::DbId;
use helios_db::models::asset::CreateAsset;
use helios_db::repositories::{AssetRepo, ProjectRepo};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Expected length of a SHA-256 hex digest.
const SHA256_HEX_LEN: usize = 64;

/// POST /api/v1/assets
///
/// Register a scene file already placed on shared storage. The checksum
/// lets workers verify their local copy before rendering.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateAsset>,
) -> AppResult<impl IntoResponse> {
    ProjectRepo::find_by_id(&state.pool, input.project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: input.project_id,
        }))?;

    if input.checksum.len() != SHA256_HEX_LEN
        || !input.checksum.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(AppError::Core(CoreError::Validation(
            "Checksum must be a SHA-256 hex digest".to_string(),
        )));
    }

    let asset = AssetRepo::create(&state.pool, &input).await?;
    tracing::info!(asset_id = asset.id, path = %asset.path, "Asset registered");
    Ok((StatusCode::CREATED, Json(DataResponse { data: asset })))
}

/// GET /api/v1/assets/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let asset = AssetRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Asset", id }))?;
    Ok(Json(DataResponse { data: asset }))
}

/// GET /api/v1/projects/{id}/assets
pub async fn list_by_project(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ProjectRepo::find_by_id(&state.pool, project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        }))?;

    let assets = AssetRepo::list_for_project(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: assets }))
}
