//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /jobs              -> list
/// POST   /jobs              -> submit
/// GET    /jobs/{id}         -> get_by_id
/// POST   /jobs/{id}/cancel  -> cancel
/// GET    /jobs/{id}/tasks   -> list_tasks
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(jobs::list).post(jobs::submit))
        .route("/jobs/{id}", get(jobs::get_by_id))
        .route("/jobs/{id}/cancel", post(jobs::cancel))
        .route("/jobs/{id}/tasks", get(jobs::list_tasks))
}
