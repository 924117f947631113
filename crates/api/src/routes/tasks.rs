//! Route definitions for the `/tasks` resource (worker protocol).

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Routes mounted at `/tasks`.
///
/// ```text
/// POST   /tasks/claim        -> claim
/// GET    /tasks/{id}         -> get_by_id
/// POST   /tasks/{id}/report  -> report
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks/claim", post(tasks::claim))
        .route("/tasks/{id}", get(tasks::get_by_id))
        .route("/tasks/{id}/report", post(tasks::report))
}
