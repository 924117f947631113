//! Pure domain logic for the Helios render farm.
//!
//! This crate has zero internal dependencies so it can be used by the
//! manager (`helios-api`), the repository layer (`helios-db`), and the
//! worker agent (`helios-worker`) alike. Nothing in here touches the
//! network or the database; everything is plain functions over plain
//! data and is unit-tested in place.

pub mod assembly;
pub mod capability;
pub mod decompose;
pub mod error;
pub mod hashing;
pub mod settings;
pub mod state;
pub mod types;

pub use error::CoreError;
