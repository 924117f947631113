//! Job, task, and worker state machines.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the API/repository layer and the worker agent. Status IDs match
//! the 1-based seed data of the `*_statuses` lookup tables; the enums in
//! the `db` crate mirror these values.

// ---------------------------------------------------------------------------
// Scheduling constants
// ---------------------------------------------------------------------------

/// Default number of times a failed task is requeued before it goes
/// terminal.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// How often a worker sends a heartbeat.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// A worker with no heartbeat for this long is marked stale and stops
/// receiving work.
pub const STALE_AFTER_SECS: u64 = 90;

/// A worker with no heartbeat for this long is marked offline and its
/// claimed tasks are requeued.
pub const OFFLINE_AFTER_SECS: u64 = 300;

/// How often the liveness monitor loop runs.
pub const LIVENESS_CHECK_INTERVAL_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Job state machine
// ---------------------------------------------------------------------------

/// Job status IDs matching `job_statuses` seed data (1-based SMALLSERIAL).
pub mod job {
    pub const PENDING: i16 = 1;
    pub const DECOMPOSING: i16 = 2;
    pub const RENDERING: i16 = 3;
    pub const ASSEMBLING: i16 = 4;
    pub const DONE: i16 = 5;
    pub const ERROR: i16 = 6;
    pub const CANCELED: i16 = 7;

    /// Returns the set of valid target status IDs reachable from `from`.
    pub fn valid_transitions(from: i16) -> &'static [i16] {
        match from {
            PENDING => &[DECOMPOSING, CANCELED],
            DECOMPOSING => &[RENDERING, ERROR, CANCELED],
            RENDERING => &[ASSEMBLING, ERROR, CANCELED],
            ASSEMBLING => &[DONE, ERROR, CANCELED],
            // Terminal states.
            DONE | ERROR | CANCELED => &[],
            _ => &[],
        }
    }

    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!(
                "Invalid job transition: {} ({from}) -> {} ({to})",
                status_name(from),
                status_name(to)
            ))
        }
    }

    pub fn is_terminal(status: i16) -> bool {
        matches!(status, DONE | ERROR | CANCELED)
    }

    pub fn status_name(id: i16) -> &'static str {
        match id {
            PENDING => "Pending",
            DECOMPOSING => "Decomposing",
            RENDERING => "Rendering",
            ASSEMBLING => "Assembling",
            DONE => "Done",
            ERROR => "Error",
            CANCELED => "Canceled",
            _ => "Unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Task status IDs matching `task_statuses` seed data (1-based SMALLSERIAL).
pub mod task {
    pub const PENDING: i16 = 1;
    pub const CLAIMED: i16 = 2;
    pub const RENDERING: i16 = 3;
    pub const DONE: i16 = 4;
    pub const ERROR: i16 = 5;

    /// Returns the set of valid target status IDs reachable from `from`.
    ///
    /// Claimed and Rendering can fall back to Pending: that is the requeue
    /// path for dead workers and retryable failures.
    pub fn valid_transitions(from: i16) -> &'static [i16] {
        match from {
            PENDING => &[CLAIMED],
            CLAIMED => &[RENDERING, PENDING, ERROR],
            RENDERING => &[DONE, PENDING, ERROR],
            // Terminal states.
            DONE | ERROR => &[],
            _ => &[],
        }
    }

    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!(
                "Invalid task transition: {} ({from}) -> {} ({to})",
                status_name(from),
                status_name(to)
            ))
        }
    }

    pub fn is_terminal(status: i16) -> bool {
        matches!(status, DONE | ERROR)
    }

    pub fn status_name(id: i16) -> &'static str {
        match id {
            PENDING => "Pending",
            CLAIMED => "Claimed",
            RENDERING => "Rendering",
            DONE => "Done",
            ERROR => "Error",
            _ => "Unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Worker state machine
// ---------------------------------------------------------------------------

/// Worker status IDs matching `worker_statuses` seed data (1-based
/// SMALLSERIAL).
pub mod worker {
    pub const ACTIVE: i16 = 1;
    pub const STALE: i16 = 2;
    pub const OFFLINE: i16 = 3;

    /// Any heartbeat revives a worker, so every state can reach Active.
    pub fn valid_transitions(from: i16) -> &'static [i16] {
        match from {
            ACTIVE => &[STALE, OFFLINE],
            STALE => &[ACTIVE, OFFLINE],
            OFFLINE => &[ACTIVE],
            _ => &[],
        }
    }

    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    pub fn status_name(id: i16) -> &'static str {
        match id {
            ACTIVE => "Active",
            STALE => "Stale",
            OFFLINE => "Offline",
            _ => "Unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Job status derivation
// ---------------------------------------------------------------------------

/// Task status counts for one job, as returned by the task repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub pending: i64,
    pub claimed: i64,
    pub rendering: i64,
    pub done: i64,
    pub error: i64,
}

impl TaskCounts {
    pub fn in_flight(&self) -> i64 {
        self.pending + self.claimed + self.rendering
    }

    pub fn total(&self) -> i64 {
        self.in_flight() + self.done + self.error
    }
}

/// Derive the status a rendering job should be in from its task counts.
///
/// With `fail_fast` a single terminal task failure fails the job while
/// siblings are still in flight; otherwise the job keeps rendering until
/// nothing is in flight and only then settles on Error or Assembling.
pub fn derive_job_status(counts: &TaskCounts, fail_fast: bool) -> i16 {
    if fail_fast && counts.error > 0 {
        return job::ERROR;
    }
    if counts.in_flight() > 0 {
        return job::RENDERING;
    }
    if counts.error > 0 {
        job::ERROR
    } else {
        job::ASSEMBLING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Job transitions
    // -----------------------------------------------------------------------

    #[test]
    fn job_happy_path() {
        assert!(job::can_transition(job::PENDING, job::DECOMPOSING));
        assert!(job::can_transition(job::DECOMPOSING, job::RENDERING));
        assert!(job::can_transition(job::RENDERING, job::ASSEMBLING));
        assert!(job::can_transition(job::ASSEMBLING, job::DONE));
    }

    #[test]
    fn job_cancelable_from_every_live_state() {
        for from in [job::PENDING, job::DECOMPOSING, job::RENDERING, job::ASSEMBLING] {
            assert!(job::can_transition(from, job::CANCELED));
        }
    }

    #[test]
    fn job_terminal_states_have_no_transitions() {
        assert!(job::valid_transitions(job::DONE).is_empty());
        assert!(job::valid_transitions(job::ERROR).is_empty());
        assert!(job::valid_transitions(job::CANCELED).is_empty());
    }

    #[test]
    fn job_cannot_skip_assembly() {
        assert!(!job::can_transition(job::RENDERING, job::DONE));
    }

    #[test]
    fn canceled_job_cannot_restart() {
        assert!(!job::can_transition(job::CANCELED, job::PENDING));
    }

    #[test]
    fn job_validate_transition_err_is_descriptive() {
        let err = job::validate_transition(job::DONE, job::RENDERING).unwrap_err();
        assert!(err.contains("Done"));
        assert!(err.contains("Rendering"));
    }

    #[test]
    fn job_terminal_predicate() {
        assert!(job::is_terminal(job::DONE));
        assert!(job::is_terminal(job::CANCELED));
        assert!(!job::is_terminal(job::RENDERING));
    }

    // -----------------------------------------------------------------------
    // Task transitions
    // -----------------------------------------------------------------------

    #[test]
    fn task_happy_path() {
        assert!(task::can_transition(task::PENDING, task::CLAIMED));
        assert!(task::can_transition(task::CLAIMED, task::RENDERING));
        assert!(task::can_transition(task::RENDERING, task::DONE));
    }

    #[test]
    fn claimed_task_can_requeue() {
        assert!(task::can_transition(task::CLAIMED, task::PENDING));
    }

    #[test]
    fn rendering_task_can_requeue() {
        assert!(task::can_transition(task::RENDERING, task::PENDING));
    }

    #[test]
    fn done_task_is_immutable() {
        assert!(task::valid_transitions(task::DONE).is_empty());
    }

    #[test]
    fn pending_task_cannot_jump_to_done() {
        assert!(!task::can_transition(task::PENDING, task::DONE));
    }

    #[test]
    fn claimed_task_must_render_before_done() {
        assert!(!task::can_transition(task::CLAIMED, task::DONE));
    }

    #[test]
    fn unknown_task_status_has_no_transitions() {
        assert!(task::valid_transitions(42).is_empty());
    }

    // -----------------------------------------------------------------------
    // Worker transitions
    // -----------------------------------------------------------------------

    #[test]
    fn worker_degrades_active_stale_offline() {
        assert!(worker::can_transition(worker::ACTIVE, worker::STALE));
        assert!(worker::can_transition(worker::STALE, worker::OFFLINE));
    }

    #[test]
    fn heartbeat_revives_from_any_state() {
        assert!(worker::can_transition(worker::STALE, worker::ACTIVE));
        assert!(worker::can_transition(worker::OFFLINE, worker::ACTIVE));
    }

    #[test]
    fn offline_does_not_go_stale() {
        assert!(!worker::can_transition(worker::OFFLINE, worker::STALE));
    }

    // -----------------------------------------------------------------------
    // Job status derivation
    // -----------------------------------------------------------------------

    #[test]
    fn all_done_means_assembling() {
        let counts = TaskCounts { done: 4, ..Default::default() };
        assert_eq!(derive_job_status(&counts, false), job::ASSEMBLING);
    }

    #[test]
    fn in_flight_tasks_keep_rendering() {
        let counts = TaskCounts { done: 3, rendering: 1, ..Default::default() };
        assert_eq!(derive_job_status(&counts, false), job::RENDERING);
    }

    #[test]
    fn error_waits_for_in_flight_without_fail_fast() {
        let counts = TaskCounts { error: 1, rendering: 2, ..Default::default() };
        assert_eq!(derive_job_status(&counts, false), job::RENDERING);
    }

    #[test]
    fn error_settles_once_nothing_in_flight() {
        let counts = TaskCounts { error: 1, done: 3, ..Default::default() };
        assert_eq!(derive_job_status(&counts, false), job::ERROR);
    }

    #[test]
    fn fail_fast_errors_immediately() {
        let counts = TaskCounts { error: 1, rendering: 2, pending: 5, ..Default::default() };
        assert_eq!(derive_job_status(&counts, true), job::ERROR);
    }

    #[test]
    fn counts_totals() {
        let counts = TaskCounts { pending: 1, claimed: 2, rendering: 3, done: 4, error: 5 };
        assert_eq!(counts.in_flight(), 6);
        assert_eq!(counts.total(), 15);
    }
}
