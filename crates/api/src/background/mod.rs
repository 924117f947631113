//! Long-running background loops spawned alongside the HTTP server.

pub mod liveness;

pub use liveness::LivenessMonitor;
