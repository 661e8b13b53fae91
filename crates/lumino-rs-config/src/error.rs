//! Error types for config loading, validation, and model resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned while loading config or resolving model profiles.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a config file or the models directory failed.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// Parsing a config file failed.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    /// Converting JSON values failed.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A specific field failed validation.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// Generic validation failure.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The requested model file does not exist.
    #[error("model not found: {}", .0.display())]
    ModelNotFound(PathBuf),
}
