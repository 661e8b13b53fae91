//! HTTP client for a running llama-server instance.

use crate::backend::DeltaStream;
use crate::error::BackendError;
use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use log::debug;
use lumino_rs_config::GenerationParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Body of `POST /completion`.
#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    repeat_penalty: f32,
    stop: &'a [String],
    stream: bool,
    cache_prompt: bool,
}

impl<'a> CompletionRequest<'a> {
    /// Build a request from the profile parameters. `echo` has no
    /// llama-server counterpart and is dropped.
    pub(crate) fn new(prompt: &'a str, params: &'a GenerationParams, stream: bool) -> Self {
        Self {
            prompt,
            n_predict: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            repeat_penalty: params.repeat_penalty,
            stop: &params.stop,
            stream,
            cache_prompt: true,
        }
    }
}

/// One completion payload, whole or streamed.
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stop: bool,
}

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    tokens: Vec<serde_json::Value>,
}

/// Client bound to one llama-server base URL.
#[derive(Debug, Clone)]
pub(crate) struct LlamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl LlamaClient {
    pub(crate) fn new(http: reqwest::Client, host: &str, port: u16) -> Self {
        Self {
            http,
            base_url: format!("http://{host}:{port}"),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Succeeds once the server has finished loading its model.
    pub(crate) async fn check_health(&self) -> Result<(), BackendError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Api(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }

    pub(crate) async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, BackendError> {
        let request = CompletionRequest::new(prompt, params, false);
        let response = self.post("/completion", &request).await?;
        let chunk: CompletionChunk = response.json().await?;
        Ok(chunk.content)
    }

    pub(crate) async fn complete_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<DeltaStream, BackendError> {
        let request = CompletionRequest::new(prompt, params, true);
        let response = self.post("/completion", &request).await?;
        Ok(decode_event_stream(response.bytes_stream().boxed()))
    }

    pub(crate) async fn count_tokens(&self, text: &str) -> Result<usize, BackendError> {
        let response = self
            .post("/tokenize", &TokenizeRequest { content: text })
            .await?;
        let body: TokenizeResponse = response.json().await?;
        Ok(body.tokens.len())
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}{path}", self.base_url);
        debug!("posting to inference server (url={url})");
        let response = self.http.post(&url).json(body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("{status}: {text}")));
        }
        Ok(response)
    }
}

/// Turn a streamed `/completion` body into content deltas, ending at the
/// first chunk flagged `stop`.
fn decode_event_stream<B>(bytes: BoxStream<'static, Result<B, reqwest::Error>>) -> DeltaStream
where
    B: AsRef<[u8]> + Send + 'static,
{
    stream::unfold(Some(bytes.eventsource()), |events| async move {
        let mut events = events?;
        loop {
            let event = match events.next().await? {
                Ok(event) => event,
                Err(EventStreamError::Transport(err)) => {
                    return Some((Err(BackendError::Http(err)), None));
                }
                Err(err) => return Some((Err(BackendError::Decode(err.to_string())), None)),
            };
            if event.data.is_empty() || event.data == "[DONE]" {
                continue;
            }
            let chunk = match serde_json::from_str::<CompletionChunk>(&event.data) {
                Ok(chunk) => chunk,
                Err(err) => return Some((Err(BackendError::Decode(err.to_string())), None)),
            };
            let rest = (!chunk.stop).then_some(events);
            if !chunk.content.is_empty() {
                return Some((Ok(chunk.content), rest));
            }
            events = rest?;
        }
    })
    .boxed()
}
