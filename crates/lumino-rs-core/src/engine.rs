//! Chat engine: one active model plus the conversation held against it.

use crate::backend::{InferenceBackend, LoadedModel};
use crate::conversation::Conversation;
use crate::error::EngineError;
use crate::prompt::ChatTemplate;
use futures_util::StreamExt;
use log::{debug, info, warn};
use lumino_rs_config::{ModelProfile, ModelRegistry};
use lumino_rs_protocol::{GenerationEvent, Turn, Usage};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;

/// Reply content when no model is active.
pub const NO_MODEL_REPLY: &str = "Error: no model loaded.";
const STREAM_BUFFER: usize = 64;

/// Receiving half of a streaming generation.
pub type GenerationStream = ReceiverStream<GenerationEvent>;

/// Engine shared between request handlers; the lock serializes generations.
pub type SharedEngine = Arc<Mutex<ChatEngine>>;

/// Result of a blocking generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub usage: Option<Usage>,
}

impl Reply {
    fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

struct ActiveModel {
    profile: ModelProfile,
    handle: Box<dyn LoadedModel>,
}

/// Owns the active model handle and the conversation history.
pub struct ChatEngine {
    backend: Arc<dyn InferenceBackend>,
    registry: ModelRegistry,
    active: Option<ActiveModel>,
    history: Conversation,
}

impl ChatEngine {
    pub fn new(backend: Arc<dyn InferenceBackend>, registry: ModelRegistry) -> Self {
        Self {
            backend,
            registry,
            active: None,
            history: Conversation::new(),
        }
    }

    /// Wrap the engine for sharing across tasks.
    pub fn shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn active_profile(&self) -> Option<&ModelProfile> {
        self.active.as_ref().map(|active| &active.profile)
    }

    pub fn history(&self) -> &[Turn] {
        self.history.turns()
    }

    pub fn clear_history(&mut self) {
        debug!("clearing history (turns={})", self.history.len());
        self.history.clear();
    }

    /// Replace the active model.
    ///
    /// An unknown model leaves the current one active. Once resolution
    /// succeeds the previous model is unloaded first, so a failed load leaves
    /// no model active. History is cleared either way.
    pub async fn switch_model(&mut self, identifier: &str) -> Result<&ModelProfile, EngineError> {
        let profile = self.registry.resolve(identifier)?;
        self.release_active().await;
        self.history.clear();

        info!(
            "loading model (id={}, family={:?}, n_ctx={})",
            profile.id, profile.family, profile.init.n_ctx
        );
        let handle = self
            .backend
            .load(&profile)
            .await
            .map_err(EngineError::Load)?;
        let active = self.active.insert(ActiveModel { profile, handle });
        Ok(&active.profile)
    }

    /// Unload the active model, if any.
    pub async fn shutdown(&mut self) {
        self.release_active().await;
    }

    async fn release_active(&mut self) {
        if let Some(previous) = self.active.take() {
            info!("unloading model (id={})", previous.profile.id);
            if let Err(err) = previous.handle.unload().await {
                warn!(
                    "model unload failed (id={}, err={err})",
                    previous.profile.id
                );
            }
        }
    }

    /// Generate a complete reply to `user_text`.
    ///
    /// Backend failures come back as reply content and leave history as it
    /// was before the call.
    pub async fn generate(&mut self, user_text: &str) -> Reply {
        let Some(active) = self.active.as_ref() else {
            return Reply::text(NO_MODEL_REPLY);
        };
        if let Err(err) = self.history.begin(user_text) {
            return Reply::text(runtime_error(&err));
        }

        let prompt = active
            .profile
            .prompt_format
            .format(&active.profile.system_prompt, self.history.turns());
        let prompt_tokens = count_or(active.handle.as_ref(), &prompt, "prompt", 0).await;

        let content = match active
            .handle
            .complete(&prompt, &active.profile.generation)
            .await
        {
            Ok(content) => content,
            Err(err) => {
                warn!("generation failed (err={err})");
                self.history.abandon();
                return Reply::text(runtime_error(&err));
            }
        };

        let completion_tokens = count_or(active.handle.as_ref(), &content, "completion", 0).await;
        if let Err(err) = self.history.complete(content.clone()) {
            self.history.abandon();
            return Reply::text(runtime_error(&err));
        }
        Reply {
            content,
            usage: Some(Usage::new(prompt_tokens, completion_tokens)),
        }
    }

    /// Stream a reply to `user_text` into `sink`.
    ///
    /// Deltas are forwarded as they arrive, followed by one usage event once
    /// the backend stream is exhausted. A closed sink cancels the generation
    /// and discards the partial reply.
    pub async fn generate_into(&mut self, user_text: &str, sink: &mpsc::Sender<GenerationEvent>) {
        let Some(active) = self.active.as_ref() else {
            let _ = sink
                .send(GenerationEvent::Delta(NO_MODEL_REPLY.to_string()))
                .await;
            return;
        };
        if let Err(err) = self.history.begin(user_text) {
            let _ = sink
                .send(GenerationEvent::Delta(runtime_error(&err)))
                .await;
            return;
        }

        let prompt = active
            .profile
            .prompt_format
            .format(&active.profile.system_prompt, self.history.turns());
        let prompt_tokens = count_or(active.handle.as_ref(), &prompt, "prompt", 0).await;

        let mut deltas = match active
            .handle
            .complete_stream(&prompt, &active.profile.generation)
            .await
        {
            Ok(deltas) => deltas,
            Err(err) => {
                warn!("streaming generation failed to start (err={err})");
                self.history.abandon();
                let _ = sink
                    .send(GenerationEvent::Delta(runtime_error(&err)))
                    .await;
                return;
            }
        };

        let mut full = String::new();
        let mut delta_count = 0usize;
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(delta) => {
                    full.push_str(&delta);
                    delta_count += 1;
                    if sink.send(GenerationEvent::Delta(delta)).await.is_err() {
                        info!(
                            "stream consumer went away; discarding partial reply (chars={})",
                            full.len()
                        );
                        self.history.abandon();
                        return;
                    }
                }
                Err(err) => {
                    warn!("streaming generation failed (err={err})");
                    self.history.abandon();
                    let _ = sink
                        .send(GenerationEvent::Delta(runtime_error(&err)))
                        .await;
                    return;
                }
            }
        }
        drop(deltas);

        let completion_tokens =
            count_or(active.handle.as_ref(), &full, "completion", delta_count).await;
        if let Err(err) = self.history.complete(full) {
            self.history.abandon();
            let _ = sink
                .send(GenerationEvent::Delta(runtime_error(&err)))
                .await;
            return;
        }
        let _ = sink
            .send(GenerationEvent::Usage(Usage::new(
                prompt_tokens,
                completion_tokens,
            )))
            .await;
    }
}

/// Start a streaming generation on its own task.
///
/// The task holds the engine lock until the generation ends, so concurrent
/// requests queue behind it. The returned stream is finite and ends when the
/// generation does.
pub fn reply_stream(engine: SharedEngine, user_text: String) -> GenerationStream {
    let (sender, receiver) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(async move {
        let mut engine = engine.lock().await;
        engine.generate_into(&user_text, &sender).await;
    });
    ReceiverStream::new(receiver)
}

fn runtime_error(err: &dyn std::fmt::Display) -> String {
    format!("Runtime error: {err}")
}

async fn count_or(model: &dyn LoadedModel, text: &str, label: &str, fallback: usize) -> usize {
    match model.count_tokens(text).await {
        Ok(count) => count,
        Err(err) => {
            warn!("token count failed; using fallback (kind={label}, fallback={fallback}, err={err})");
            fallback
        }
    }
}
