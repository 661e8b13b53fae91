//! Wire protocol types shared by the Lumino HTTP surface and its clients.
//!
//! The server speaks plain JSON for request/response routes and newline
//! delimited JSON (one [`StreamLine`] per line) for streaming chat replies.

use serde::{Deserialize, Serialize};

/// Route for chat requests.
pub const CHAT_ROUTE: &str = "/chat";
/// Route listing selectable models.
pub const MODELS_ROUTE: &str = "/models";
/// Route switching the active model.
pub const SET_MODEL_ROUTE: &str = "/model/set";
/// Route clearing the conversation history.
pub const RESET_ROUTE: &str = "/reset";
/// Content type of streaming chat replies.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User-authored turn.
    User,
    /// Model-authored turn.
    Assistant,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    /// Build a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token accounting for one generation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    /// Build usage stats, deriving the total.
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Unit of a streaming generation as produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Incremental fragment of model output.
    Delta(String),
    /// Trailing token summary, emitted once the stream is drained.
    Usage(Usage),
}

/// One line of a streaming chat reply on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum StreamLine {
    /// Content delta.
    Token { content: String },
    /// Usage summary.
    Usage { stats: Usage },
}

impl StreamLine {
    /// Encode the line as one NDJSON record, newline included.
    pub fn to_ndjson(&self) -> String {
        // Serializing a plain enum of strings and integers cannot fail.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }

    /// Decode one NDJSON record. Blank lines decode to `None`.
    pub fn from_ndjson(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(trimmed).map(Some)
    }
}

impl From<GenerationEvent> for StreamLine {
    fn from(event: GenerationEvent) -> Self {
        match event {
            GenerationEvent::Delta(content) => StreamLine::Token { content },
            GenerationEvent::Usage(stats) => StreamLine::Usage { stats },
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stream: bool,
}

/// Non-streaming reply of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub files_read: Vec<String>,
}

/// Reply of `GET /models`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelList {
    pub models: Vec<String>,
    #[serde(default)]
    pub active: Option<String>,
}

/// Body of `POST /model/set`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetModelRequest {
    pub model: String,
}

/// Outcome marker for action routes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Reply of action routes such as `POST /model/set` and `POST /reset`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusReply {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReply {
    /// Successful action with a human readable message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            model: None,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Failed action carrying the error text.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            model: None,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Attach the model id the action refers to.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Generic error body for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn stream_lines_use_type_tags() {
        let token = StreamLine::Token {
            content: "hi".to_string(),
        };
        assert_eq!(token.to_ndjson(), "{\"type\":\"token\",\"content\":\"hi\"}\n");

        let usage = StreamLine::from(GenerationEvent::Usage(Usage::new(3, 4)));
        let value = serde_json::to_value(&usage).expect("value");
        assert_eq!(
            value,
            json!({
                "type": "usage",
                "stats": { "prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7 }
            })
        );
    }

    #[test]
    fn blank_ndjson_lines_are_skipped() {
        assert_eq!(StreamLine::from_ndjson("   \r").expect("parse"), None);
        let line = StreamLine::from_ndjson("{\"type\":\"token\",\"content\":\"a\"}\r")
            .expect("parse")
            .expect("line");
        assert_eq!(
            line,
            StreamLine::Token {
                content: "a".to_string()
            }
        );
    }

    #[test]
    fn chat_request_defaults_to_blocking() {
        let request: ChatRequest = serde_json::from_str(r#"{"message":"hello"}"#).expect("parse");
        assert!(!request.stream);
        assert_eq!(request.message, "hello");
    }

    #[test]
    fn status_reply_omits_empty_fields() {
        let reply = StatusReply::success("switched").with_model("a.gguf");
        let value = serde_json::to_value(&reply).expect("value");
        assert_eq!(
            value,
            json!({ "status": "success", "model": "a.gguf", "message": "switched" })
        );
    }
}
