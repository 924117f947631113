//! Worker-side error type.

use std::path::PathBuf;

use helios_core::error::CoreError;

/// Errors from the worker agent layers.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The manager returned a non-2xx status code.
    #[error("Manager API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A downloaded tool archive did not hash to the expected digest.
    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    /// The render process failed or produced no output.
    #[error("Render failed: {0}")]
    Render(String),

    /// The render process outlived its time budget.
    #[error("Render timed out after {0} seconds")]
    RenderTimeout(u64),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl WorkerError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
