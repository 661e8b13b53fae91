//! HTTP client for the Lumino server.

use crate::event::AppEvent;
use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use log::{debug, info};
use lumino_rs_protocol::{
    CHAT_ROUTE, ChatReply, ChatRequest, MODELS_ROUTE, ModelList, RESET_ROUTE, SET_MODEL_ROUTE,
    SetModelRequest, StatusReply, StreamLine,
};
use reqwest::Response;
use tokio::sync::mpsc;

/// Thin wrapper over the server routes used by the TUI.
#[derive(Clone)]
pub struct LuminoClient {
    http: reqwest::Client,
    base_url: String,
}

impl LuminoClient {
    /// Create a client for the server at `base_url` (e.g. `http://127.0.0.1:5000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a message and wait for the complete reply.
    pub async fn chat(&self, message: &str) -> Result<ChatReply> {
        debug!("sending chat request (stream=false, len={})", message.len());
        let response = self.post_chat(message, false).await?;
        let reply = response
            .json::<ChatReply>()
            .await
            .context("failed to decode chat reply")?;
        Ok(reply)
    }

    /// Send a message and forward streamed deltas to `sender` as they arrive.
    ///
    /// Returns once the server closes the stream or the receiver is dropped.
    pub async fn chat_stream(&self, message: &str, sender: &mpsc::Sender<AppEvent>) -> Result<()> {
        debug!("sending chat request (stream=true, len={})", message.len());
        let response = self.post_chat(message, true).await?;
        let mut body = response.bytes_stream();
        let mut buffer = LineBuffer::default();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("reply stream interrupted")?;
            for line in buffer.push(&chunk) {
                if !forward_line(&line, sender).await? {
                    info!("reply receiver dropped, abandoning stream");
                    return Ok(());
                }
            }
        }
        if let Some(line) = buffer.finish() {
            forward_line(&line, sender).await?;
        }
        Ok(())
    }

    pub async fn list_models(&self) -> Result<ModelList> {
        let response = self
            .http
            .get(self.url(MODELS_ROUTE))
            .send()
            .await
            .with_context(|| self.unreachable())?
            .error_for_status()?;
        Ok(response.json::<ModelList>().await?)
    }

    /// Ask the server to switch models. Server-side failures come back as an
    /// error [`StatusReply`] rather than `Err`.
    pub async fn set_model(&self, model: &str) -> Result<StatusReply> {
        info!("requesting model switch (model={model})");
        let response = self
            .http
            .post(self.url(SET_MODEL_ROUTE))
            .json(&SetModelRequest {
                model: model.to_string(),
            })
            .send()
            .await
            .with_context(|| self.unreachable())?;
        status_reply(response).await
    }

    pub async fn reset(&self) -> Result<StatusReply> {
        let response = self
            .http
            .post(self.url(RESET_ROUTE))
            .send()
            .await
            .with_context(|| self.unreachable())?;
        status_reply(response).await
    }

    async fn post_chat(&self, message: &str, stream: bool) -> Result<Response> {
        let request = ChatRequest {
            message: message.to_string(),
            stream,
        };
        let response = self
            .http
            .post(self.url(CHAT_ROUTE))
            .json(&request)
            .send()
            .await
            .with_context(|| self.unreachable())?
            .error_for_status()?;
        Ok(response)
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    fn unreachable(&self) -> String {
        format!("cannot connect to server at {}", self.base_url)
    }
}

async fn status_reply(response: Response) -> Result<StatusReply> {
    let status = response.status();
    let bytes = response.bytes().await?;
    match serde_json::from_slice::<StatusReply>(&bytes) {
        Ok(reply) => Ok(reply),
        Err(_) => bail!("server returned {status}"),
    }
}

/// Decode one NDJSON line and forward it. Returns false once the receiver is gone.
async fn forward_line(line: &str, sender: &mpsc::Sender<AppEvent>) -> Result<bool> {
    let Some(line) = StreamLine::from_ndjson(line).context("malformed stream line")? else {
        return Ok(true);
    };
    let event = match line {
        StreamLine::Token { content } => AppEvent::Token(content),
        StreamLine::Usage { stats } => AppEvent::Usage(stats),
    };
    Ok(sender.send(event).await.is_ok())
}

/// Splits a byte stream into newline-terminated lines.
///
/// Bytes are held until a full line is present so multi-byte characters split
/// across chunks decode intact.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    fn finish(self) -> Option<String> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(String::from_utf8_lossy(&self.pending).into_owned())
    }
}
