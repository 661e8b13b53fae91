//! Configuration models, layered config loading, and the model registry.
//!
//! This crate owns the Lumino settings schema, the per-family model profile
//! table, and the registry that turns a model file name into a resolved
//! [`ModelProfile`].

mod error;
mod loader;
mod model;
mod profile;
mod registry;

/// Public error type returned by config loading and model resolution.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::*;
/// Model profile types and the family table.
pub use profile::{GenerationParams, InitParams, ModelFamily, ModelProfile, PromptFormat};
/// Model discovery and resolution.
pub use registry::{MODEL_EXTENSION, ModelRegistry};
