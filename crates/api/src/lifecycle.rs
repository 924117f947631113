//! Job lifecycle reactions to task settlement.
//!
//! Every time a task reaches a terminal status (done or error), the
//! job's task counts are re-derived and the job is moved along its own
//! state machine: to Assembling when the last task finishes, or to Error
//! when a failure sticks. Status moves are compare-and-set so concurrent
//! reports settle the job exactly once.

use helios_core::state::{self, derive_job_status};
use helios_core::types::DbId;
use helios_db::models::status::JobStatus;
use helios_db::repositories::{JobRepo, TaskRepo};

use crate::error::AppResult;
use crate::state::AppState;

/// React to a task reaching a terminal status.
pub async fn on_task_settled(state: &AppState, job_id: DbId) -> AppResult<()> {
    let counts = TaskRepo::counts_for_job(&state.pool, job_id).await?;
    let derived = derive_job_status(&counts, state.config.fail_fast);

    match derived {
        state::job::RENDERING => Ok(()),

        state::job::ASSEMBLING => {
            let moved = JobRepo::transition(
                &state.pool,
                job_id,
                JobStatus::Rendering.id(),
                JobStatus::Assembling.id(),
            )
            .await?;

            // None: a concurrent report already started assembly, or the
            // job was canceled in the meantime.
            if moved.is_some() {
                tracing::info!(job_id, done = counts.done, "All tasks done, assembling");
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = crate::engine::assembler::assemble_job(&state, job_id).await {
                        tracing::error!(job_id, error = %e, "Assembly failed");
                        let _ = JobRepo::fail(&state.pool, job_id, &e.to_string()).await;
                    }
                });
            }
            Ok(())
        }

        _ => {
            if state.config.fail_fast && counts.pending > 0 {
                let swept = TaskRepo::fail_pending_for_job(
                    &state.pool,
                    job_id,
                    "Canceled by fail-fast after a sibling task failed",
                )
                .await?;
                tracing::warn!(job_id, swept, "Fail-fast sibling sweep");
            }

            if JobRepo::fail(&state.pool, job_id, "One or more tasks failed terminally")
                .await?
                .is_some()
            {
                tracing::warn!(job_id, errors = counts.error, "Job failed");
            }
            Ok(())
        }
    }
}
