//! Route definitions for the `/projects` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::{assets, projects};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /projects              -> list
/// POST   /projects              -> create
/// GET    /projects/{id}         -> get_by_id
/// PATCH  /projects/{id}         -> update
/// GET    /projects/{id}/assets  -> assets::list_by_project
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(projects::list).post(projects::create))
        .route(
            "/projects/{id}",
            get(projects::get_by_id).patch(projects::update),
        )
        .route("/projects/{id}/assets", get(assets::list_by_project))
}
