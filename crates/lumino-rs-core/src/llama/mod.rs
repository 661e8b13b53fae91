//! Inference backend driving a llama.cpp `llama-server` child process.
//!
//! Each loaded model owns one child process listening on loopback; prompts
//! are sent raw to `/completion` so the profile's prompt format is honored
//! exactly.

mod client;
mod process;

use crate::backend::{DeltaStream, InferenceBackend, LoadedModel};
use crate::error::BackendError;
use async_trait::async_trait;
use client::LlamaClient;
use log::info;
use lumino_rs_config::{BackendConfig, GenerationParams, ModelProfile};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::Mutex;

/// Spawns one llama-server per loaded model.
#[derive(Debug, Clone)]
pub struct LlamaServerBackend {
    config: BackendConfig,
    http: reqwest::Client,
}

impl LlamaServerBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl InferenceBackend for LlamaServerBackend {
    async fn load(&self, profile: &ModelProfile) -> Result<Box<dyn LoadedModel>, BackendError> {
        let binary = process::locate_binary(&self.config.binary)?;
        let args = process::server_args(profile, &self.config.host, self.config.port);
        info!(
            "starting llama-server (model={}, binary={}, port={})",
            profile.id,
            binary.display(),
            self.config.port
        );
        let mut child = process::spawn(&binary, &args)?;
        let client = LlamaClient::new(self.http.clone(), &self.config.host, self.config.port);
        process::wait_ready(
            &mut child,
            &client,
            Duration::from_secs(self.config.ready_timeout_secs),
        )
        .await?;
        Ok(Box::new(LlamaServerModel {
            client,
            child: Mutex::new(child),
        }))
    }
}

/// A model served by a running llama-server child.
pub struct LlamaServerModel {
    client: LlamaClient,
    child: Mutex<Child>,
}

#[async_trait]
impl LoadedModel for LlamaServerModel {
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, BackendError> {
        self.client.complete(prompt, params).await
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<DeltaStream, BackendError> {
        self.client.complete_stream(prompt, params).await
    }

    async fn count_tokens(&self, text: &str) -> Result<usize, BackendError> {
        self.client.count_tokens(text).await
    }

    async fn unload(self: Box<Self>) -> Result<(), BackendError> {
        let mut child = self.child.into_inner();
        process::stop(&mut child).await
    }
}
