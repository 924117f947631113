//! Manager service: HTTP API, job lifecycle, assembly, and liveness
//! monitoring for the Helios render farm.

pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
