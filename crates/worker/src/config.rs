//! Worker configuration loaded from environment variables.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default                      | Description                          |
//! |-------------------------|----------|------------------------------|--------------------------------------|
//! | `MANAGER_URL`           | yes      | --                           | Manager base URL, e.g. `http://host:3000` |
//! | `WORKER_NAME`           | no       | hostname                     | Stable name used for registration    |
//! | `CACHE_DIR`             | no       | `/var/cache/helios`          | Local renderer installation cache    |
//! | `WORK_DIR`              | no       | `/var/lib/helios-worker`     | Scratch space for render output      |
//! | `CLAIM_POLL_SECS`       | no       | `5`                          | Seconds between claim attempts when idle |
//! | `RENDER_TIMEOUT_SECS`   | no       | `3600`                       | Per-task render time budget          |

use std::path::PathBuf;

/// Default idle polling interval for the claim loop.
const DEFAULT_CLAIM_POLL_SECS: u64 = 5;
/// Default per-task render time budget.
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 3600;

/// Worker agent configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub manager_url: String,
    pub worker_name: String,
    pub cache_dir: PathBuf,
    pub work_dir: PathBuf,
    pub claim_poll_secs: u64,
    pub render_timeout_secs: u64,
}

impl WorkerConfig {
    /// Load configuration from the environment.
    ///
    /// Panics when `MANAGER_URL` is missing; the worker cannot do
    /// anything without a manager to talk to.
    pub fn from_env() -> Self {
        let manager_url = std::env::var("MANAGER_URL")
            .expect("MANAGER_URL must be set")
            .trim_end_matches('/')
            .to_string();

        let worker_name = std::env::var("WORKER_NAME").unwrap_or_else(|_| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "helios-worker".to_string())
        });

        let cache_dir = std::env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/var/cache/helios"));

        let work_dir = std::env::var("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/var/lib/helios-worker"));

        let claim_poll_secs = std::env::var("CLAIM_POLL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CLAIM_POLL_SECS);

        let render_timeout_secs = std::env::var("RENDER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS);

        Self {
            manager_url,
            worker_name,
            cache_dir,
            work_dir,
            claim_poll_secs,
            render_timeout_secs,
        }
    }
}
