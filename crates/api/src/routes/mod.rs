pub mod assets;
pub mod health;
pub mod jobs;
pub mod projects;
pub mod tasks;
pub mod tools;
pub mod workers;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /projects                      list, create
/// /projects/{id}                 get, update (pause/resume)
/// /projects/{id}/assets          assets of a project
///
/// /assets                        register
/// /assets/{id}                   get
///
/// /tools                         catalog list, register
///
/// /jobs                          list, submit
/// /jobs/{id}                     get
/// /jobs/{id}/cancel              cancel (POST)
/// /jobs/{id}/tasks               task list
///
/// /tasks/claim                   claim next runnable task (POST)
/// /tasks/{id}                    get
/// /tasks/{id}/report             worker progress report (POST)
///
/// /workers                       list, register
/// /workers/{id}                  get
/// /workers/{id}/heartbeat        heartbeat (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(projects::router())
        .merge(assets::router())
        .merge(tools::router())
        .merge(jobs::router())
        .merge(tasks::router())
        .merge(workers::router())
}
