//! Seam between the engine and the inference runtime.

use crate::error::BackendError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use lumino_rs_config::{GenerationParams, ModelProfile};

/// Incremental content fragments of one completion.
pub type DeltaStream = BoxStream<'static, Result<String, BackendError>>;

/// Loads models into an inference runtime.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Load the model described by `profile` with its init parameters.
    async fn load(&self, profile: &ModelProfile) -> Result<Box<dyn LoadedModel>, BackendError>;
}

/// A model resident in the runtime.
#[async_trait]
pub trait LoadedModel: Send + Sync {
    /// Complete `prompt` in one shot.
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, BackendError>;

    /// Complete `prompt` as a stream of content deltas.
    async fn complete_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<DeltaStream, BackendError>;

    /// Number of tokens `text` encodes to.
    async fn count_tokens(&self, text: &str) -> Result<usize, BackendError>;

    /// Release the model. Returns once its resources are freed.
    async fn unload(self: Box<Self>) -> Result<(), BackendError>;
}
