//! Error types for the core engine crate.

use lumino_rs_config::ConfigError;
use thiserror::Error;

/// Errors raised by an inference backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The runtime binary could not be located.
    #[error("inference binary not found: {0}")]
    BinaryNotFound(String),
    /// Spawning the runtime process failed.
    #[error("failed to start inference server: {0}")]
    Spawn(String),
    /// The runtime did not become ready in time.
    #[error("inference server not ready after {0}s")]
    Timeout(u64),
    /// The runtime process exited on its own.
    #[error("inference server exited: {0}")]
    Exited(String),
    /// Transport failure talking to the runtime.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The runtime answered with a non-success status.
    #[error("api error: {0}")]
    Api(String),
    /// The runtime sent a payload we could not decode.
    #[error("decode error: {0}")]
    Decode(String),
    /// Generation failed inside the runtime.
    #[error("generation failed: {0}")]
    Generation(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Profile resolution failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Loading the model into the backend failed.
    #[error("failed to load model: {0}")]
    Load(#[source] BackendError),
}

impl EngineError {
    /// True when the requested model does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::Config(ConfigError::ModelNotFound(_) | ConfigError::Invalid(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resolution_failures_count_as_not_found() {
        let missing = EngineError::from(ConfigError::ModelNotFound("ghost.gguf".into()));
        assert!(missing.is_not_found());

        let load = EngineError::Load(BackendError::Timeout(5));
        assert!(!load.is_not_found());
        assert_eq!(
            load.to_string(),
            "failed to load model: inference server not ready after 5s"
        );
    }
}
