//! Route definitions for the `/workers` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workers;
use crate::state::AppState;

/// Routes mounted at `/workers`.
///
/// ```text
/// GET    /workers                 -> list
/// POST   /workers                 -> register
/// GET    /workers/{id}            -> get_by_id
/// POST   /workers/{id}/heartbeat  -> heartbeat
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workers", get(workers::list).post(workers::register))
        .route("/workers/{id}", get(workers::get_by_id))
        .route("/workers/{id}/heartbeat", post(workers::heartbeat))
}
