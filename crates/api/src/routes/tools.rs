//! Route definitions for the `/tools` resource (renderer catalog).

use axum::routing::get;
use axum::Router;

use crate::handlers::tools;
use crate::state::AppState;

/// Routes mounted at `/tools`.
///
/// ```text
/// GET    /tools        -> list (the catalog workers sync against)
/// POST   /tools        -> create
/// GET    /tools/{id}   -> get_by_id
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tools", get(tools::list).post(tools::create))
        .route("/tools/{id}", get(tools::get_by_id))
}
