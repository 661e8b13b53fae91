//! Route behavior over a scripted backend.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use futures_util::StreamExt;
use lumino_rs_config::ModelRegistry;
use lumino_rs_core::{ChatEngine, IncludeResolver};
use lumino_rs_protocol::{ChatReply, ModelList, Status, StatusReply, StreamLine};
use lumino_rs_server::{AppContext, router};
use lumino_rs_test_utils::{ScriptedBackend, models_dir};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const CODER: &str = "tiny-coder.gguf";
const OTHER: &str = "phi-2.gguf";

struct Harness {
    ctx: AppContext,
    backend: ScriptedBackend,
    _models: TempDir,
}

async fn harness(backend: ScriptedBackend, load: bool) -> Harness {
    let models = models_dir(&[CODER, OTHER]);
    let registry = ModelRegistry::new(models.path());
    let mut engine = ChatEngine::new(Arc::new(backend.clone()), registry.clone());
    if load {
        engine.switch_model(CODER).await.expect("switch");
    }
    Harness {
        ctx: AppContext::new(engine.shared(), registry),
        backend,
        _models: models,
    }
}

async fn send(
    ctx: &AppContext,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>, Option<String>) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router(ctx.clone())
        .oneshot(request.body(body).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, bytes.to_vec(), content_type)
}

#[tokio::test]
async fn blocking_chat_returns_reply() {
    let h = harness(ScriptedBackend::new(["hi there"]), true).await;
    let (status, body, _) = send(
        &h.ctx,
        "POST",
        "/chat",
        Some(json!({ "message": "hello", "stream": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reply: ChatReply = serde_json::from_slice(&body).expect("reply");
    assert_eq!(reply.response, "hi there");
    assert_eq!(reply.usage.map(|usage| usage.completion_tokens), Some(2));
    assert!(reply.files_read.is_empty());
}

#[tokio::test]
async fn streaming_chat_emits_ndjson_lines() {
    let h = harness(ScriptedBackend::new(["hi", " there"]), true).await;
    let (status, body, content_type) = send(
        &h.ctx,
        "POST",
        "/chat",
        Some(json!({ "message": "hello", "stream": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/x-ndjson"));

    let text = String::from_utf8(body).expect("utf8");
    let lines: Vec<StreamLine> = text
        .lines()
        .filter_map(|line| StreamLine::from_ndjson(line).expect("line"))
        .collect();
    assert_eq!(
        lines[..2],
        [
            StreamLine::Token {
                content: "hi".to_string()
            },
            StreamLine::Token {
                content: " there".to_string()
            },
        ]
    );
    match &lines[2] {
        StreamLine::Usage { stats } => assert_eq!(stats.completion_tokens, 2),
        other => panic!("expected usage line, got {other:?}"),
    }
    assert_eq!(lines.len(), 3);
    assert_eq!(h.ctx.engine().lock().await.history().len(), 2);
}

#[tokio::test]
async fn dropped_stream_leaves_history_untouched() {
    let chunks: Vec<String> = (0..200).map(|n| format!("t{n} ")).collect();
    let h = harness(ScriptedBackend::new(chunks), true).await;
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "message": "hello", "stream": true }).to_string(),
        ))
        .expect("request");
    let response = router(h.ctx.clone())
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.expect("frame").expect("bytes");
    let first = String::from_utf8(first.to_vec()).expect("utf8");
    let line = first.lines().next().expect("line");
    assert_eq!(
        StreamLine::from_ndjson(line).expect("decode"),
        Some(StreamLine::Token {
            content: "t0 ".to_string()
        })
    );
    drop(body);

    let engine = h.ctx.engine().lock().await;
    assert!(engine.history().is_empty());
    assert_eq!(h.backend.log().prompts.len(), 1);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let h = harness(ScriptedBackend::new(["unused"]), true).await;
    let (status, body, _) = send(&h.ctx, "POST", "/chat", Some(json!({ "message": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let value: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(value, json!({ "error": "empty message" }));
    assert!(h.backend.log().prompts.is_empty());
}

#[tokio::test]
async fn chat_without_model_reports_it() {
    let h = harness(ScriptedBackend::new(["unused"]), false).await;
    let (status, body, _) = send(&h.ctx, "POST", "/chat", Some(json!({ "message": "hi" }))).await;
    assert_eq!(status, StatusCode::OK);
    let reply: ChatReply = serde_json::from_slice(&body).expect("reply");
    assert_eq!(reply.response, "Error: no model loaded.");
    assert_eq!(reply.usage, None);
}

#[tokio::test]
async fn chat_expands_read_directives() {
    let project = TempDir::new().expect("tmp");
    fs::write(project.path().join("notes.md"), "remember this").expect("write");
    let h = harness(ScriptedBackend::new(["done"]), true).await;
    let ctx = h.ctx.clone().with_include(IncludeResolver::new(project.path()));

    let (_, body, _) = send(
        &ctx,
        "POST",
        "/chat",
        Some(json!({ "message": "summarise /read notes.md" })),
    )
    .await;
    let reply: ChatReply = serde_json::from_slice(&body).expect("reply");
    assert_eq!(reply.files_read, vec!["notes.md"]);
    let prompts = h.backend.log().prompts;
    assert!(prompts[0].contains("--- START OF FILE: notes.md ---\n```md\nremember this\n```"));
}

#[tokio::test]
async fn models_lists_files_and_active() {
    let h = harness(ScriptedBackend::new(["ok"]), true).await;
    let (status, body, _) = send(&h.ctx, "GET", "/models", None).await;
    assert_eq!(status, StatusCode::OK);
    let list: ModelList = serde_json::from_slice(&body).expect("list");
    assert_eq!(list.models, vec![OTHER, CODER]);
    assert_eq!(list.active.as_deref(), Some(CODER));
}

#[tokio::test]
async fn set_model_switches_and_resets_history() {
    let h = harness(ScriptedBackend::new(["ok"]), true).await;
    send(&h.ctx, "POST", "/chat", Some(json!({ "message": "hi" }))).await;

    let (status, body, _) = send(
        &h.ctx,
        "POST",
        "/model/set",
        Some(json!({ "model": OTHER })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reply: StatusReply = serde_json::from_slice(&body).expect("reply");
    assert_eq!(reply.status, Status::Success);
    assert_eq!(reply.model.as_deref(), Some(OTHER));
    assert!(h.ctx.engine().lock().await.history().is_empty());
    assert_eq!(h.backend.log().unloads, vec![CODER]);
}

#[tokio::test]
async fn set_model_unknown_is_not_found() {
    let h = harness(ScriptedBackend::new(["ok"]), true).await;
    let (status, body, _) = send(
        &h.ctx,
        "POST",
        "/model/set",
        Some(json!({ "model": "ghost.gguf" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let reply: StatusReply = serde_json::from_slice(&body).expect("reply");
    assert_eq!(reply.status, Status::Error);
    assert!(reply.error.expect("error").contains("ghost.gguf"));
}

#[tokio::test]
async fn set_model_load_failure_is_server_error() {
    let h = harness(ScriptedBackend::new(["ok"]).failing_load("no vram"), false).await;
    let (status, _, _) = send(
        &h.ctx,
        "POST",
        "/model/set",
        Some(json!({ "model": CODER })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(h.ctx.engine().lock().await.active_profile().is_none());
}

#[tokio::test]
async fn reset_clears_history() {
    let h = harness(ScriptedBackend::new(["ok"]), true).await;
    send(&h.ctx, "POST", "/chat", Some(json!({ "message": "hi" }))).await;
    let (status, body, _) = send(&h.ctx, "POST", "/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    let reply: StatusReply = serde_json::from_slice(&body).expect("reply");
    assert_eq!(reply.status, Status::Success);
    assert!(h.ctx.engine().lock().await.history().is_empty());
}
