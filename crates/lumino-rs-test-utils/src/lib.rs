//! Test helpers shared across Lumino crates.

pub mod backend;
pub mod fixtures;

pub use backend::{BackendLog, ScriptedBackend};
pub use fixtures::models_dir;
