//! Core chat primitives for Lumino.
//!
//! This crate owns prompt rendering, the conversation history, the chat
//! engine, the inference backend seam with its llama-server implementation,
//! and the `/read` file-inclusion preprocessor.

pub mod backend;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod include;
pub mod llama;
pub mod prompt;

pub use backend::{DeltaStream, InferenceBackend, LoadedModel};
pub use conversation::{Conversation, HistoryError};
/// Engine facade and streaming helpers.
pub use engine::{
    ChatEngine, GenerationStream, NO_MODEL_REPLY, Reply, SharedEngine, reply_stream,
};
pub use error::{BackendError, EngineError};
pub use include::{Expanded, IncludeResolver, directives};
pub use llama::LlamaServerBackend;
pub use prompt::ChatTemplate;
