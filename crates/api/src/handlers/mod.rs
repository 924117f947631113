//! HTTP handlers, one module per resource.

pub mod assets;
pub mod jobs;
pub mod projects;
pub mod tasks;
pub mod tools;
pub mod workers;
