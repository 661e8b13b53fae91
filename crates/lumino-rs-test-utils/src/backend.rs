use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use lumino_rs_config::{GenerationParams, ModelProfile};
use lumino_rs_core::{BackendError, DeltaStream, InferenceBackend, LoadedModel};
use parking_lot::Mutex;
use std::sync::Arc;

/// Calls observed by a [`ScriptedBackend`] and the models it loaded.
#[derive(Debug, Clone, Default)]
pub struct BackendLog {
    pub loads: Vec<String>,
    pub unloads: Vec<String>,
    pub prompts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Script {
    chunks: Vec<String>,
    fail_load: Option<String>,
    fail_generation: Option<String>,
    fail_mid_stream: Option<String>,
    fail_token_count: bool,
}

/// Backend whose models answer every prompt with the same scripted chunks.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: Script,
    log: Arc<Mutex<BackendLog>>,
}

impl ScriptedBackend {
    /// Reply with `chunks`; the blocking reply is their concatenation.
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Script {
                chunks: chunks.into_iter().map(Into::into).collect(),
                ..Script::default()
            },
            log: Arc::new(Mutex::new(BackendLog::default())),
        }
    }

    pub fn failing_load(mut self, message: impl Into<String>) -> Self {
        self.script.fail_load = Some(message.into());
        self
    }

    pub fn failing_generation(mut self, message: impl Into<String>) -> Self {
        self.script.fail_generation = Some(message.into());
        self
    }

    /// Emit every chunk, then fail the stream.
    pub fn failing_mid_stream(mut self, message: impl Into<String>) -> Self {
        self.script.fail_mid_stream = Some(message.into());
        self
    }

    pub fn failing_token_count(mut self) -> Self {
        self.script.fail_token_count = true;
        self
    }

    pub fn log(&self) -> BackendLog {
        self.log.lock().clone()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn load(&self, profile: &ModelProfile) -> Result<Box<dyn LoadedModel>, BackendError> {
        if let Some(message) = &self.script.fail_load {
            return Err(BackendError::Spawn(message.clone()));
        }
        self.log.lock().loads.push(profile.id.clone());
        Ok(Box::new(ScriptedModel {
            id: profile.id.clone(),
            script: self.script.clone(),
            log: self.log.clone(),
        }))
    }
}

struct ScriptedModel {
    id: String,
    script: Script,
    log: Arc<Mutex<BackendLog>>,
}

impl ScriptedModel {
    fn record(&self, prompt: &str) -> Result<(), BackendError> {
        self.log.lock().prompts.push(prompt.to_string());
        match &self.script.fail_generation {
            Some(message) => Err(BackendError::Generation(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LoadedModel for ScriptedModel {
    async fn complete(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, BackendError> {
        self.record(prompt)?;
        Ok(self.script.chunks.concat())
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<DeltaStream, BackendError> {
        self.record(prompt)?;
        let mut items: Vec<Result<String, BackendError>> =
            self.script.chunks.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.script.fail_mid_stream {
            items.push(Err(BackendError::Generation(message.clone())));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn count_tokens(&self, text: &str) -> Result<usize, BackendError> {
        if self.script.fail_token_count {
            return Err(BackendError::Api("tokenize unavailable".to_string()));
        }
        Ok(text.split_whitespace().count())
    }

    async fn unload(self: Box<Self>) -> Result<(), BackendError> {
        self.log.lock().unloads.push(self.id.clone());
        Ok(())
    }
}
