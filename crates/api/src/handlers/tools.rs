//! Handlers for the `/tools` resource (renderer catalog).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use helios_core::error::CoreError;
use helios_core::types::DbId;
use helios_db::models::tool::CreateTool;
use helios_db::repositories::ToolRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/tools
///
/// Register a renderer archive. Returns 409 when the
/// engine/version/platform combination already exists.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateTool>,
) -> AppResult<impl IntoResponse> {
    for (field, value) in [
        ("engine", &input.engine),
        ("version", &input.version),
        ("platform", &input.platform),
        ("url", &input.url),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Tool {field} must not be empty"
            ))));
        }
    }

    let tool = ToolRepo::create(&state.pool, &input).await?;
    tracing::info!(tool_id = tool.id, key = %tool.cache_key(), "Tool registered");
    Ok((StatusCode::CREATED, Json(DataResponse { data: tool })))
}

/// GET /api/v1/tools
///
/// The full catalog. Workers filter by their own platform client-side.
pub async fn list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let tools = ToolRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: tools }))
}

/// GET /api/v1/tools/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let tool = ToolRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Tool", id }))?;
    Ok(Json(DataResponse { data: tool }))
}
