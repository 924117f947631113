//! `helios-worker` library crate.
//!
//! Render worker agent: registers with the manager, heartbeats, claims
//! tasks, keeps a local cache of renderer installations, and runs renders.
//! The binary entrypoint lives in `main.rs`.

pub mod capability;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod poll;
pub mod tool_cache;

pub use error::WorkerError;
