//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod asset_repo;
pub mod job_repo;
pub mod project_repo;
pub mod task_repo;
pub mod tool_repo;
pub mod worker_repo;

pub use asset_repo::AssetRepo;
pub use job_repo::JobRepo;
pub use project_repo::ProjectRepo;
pub use task_repo::TaskRepo;
pub use tool_repo::ToolRepo;
pub use worker_repo::WorkerRepo;
