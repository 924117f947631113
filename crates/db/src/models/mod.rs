//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts

pub mod asset;
pub mod job;
pub mod project;
pub mod status;
pub mod task;
pub mod tool;
pub mod worker;
