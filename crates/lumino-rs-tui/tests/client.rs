//! Client round trips against a live server over a scripted backend.

use lumino_rs_config::ModelRegistry;
use lumino_rs_core::ChatEngine;
use lumino_rs_protocol::Status;
use lumino_rs_server::{AppContext, serve};
use lumino_rs_test_utils::{ScriptedBackend, models_dir};
use lumino_rs_tui::{AppEvent, LuminoClient};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const MODEL: &str = "tiny-coder.gguf";

async fn start(chunks: &[&str]) -> (LuminoClient, TempDir) {
    let models = models_dir(&[MODEL]);
    let registry = ModelRegistry::new(models.path());
    let backend = ScriptedBackend::new(chunks.iter().copied());
    let mut engine = ChatEngine::new(Arc::new(backend), registry.clone());
    engine.switch_model(MODEL).await.expect("switch");
    let ctx = AppContext::new(engine.shared(), registry);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(serve(listener, ctx, std::future::pending()));
    (LuminoClient::new(format!("http://{addr}")), models)
}

#[tokio::test]
async fn blocking_chat_returns_reply() {
    let (client, _models) = start(&["hi", " there"]).await;
    let reply = client.chat("hello").await.expect("chat");
    assert_eq!(reply.response, "hi there");
    assert_eq!(reply.usage.map(|usage| usage.completion_tokens), Some(2));
}

#[tokio::test]
async fn streamed_chat_forwards_tokens_then_usage() {
    let (client, _models) = start(&["hi", " there"]).await;
    let (sender, mut receiver) = mpsc::channel(16);
    client.chat_stream("hello", &sender).await.expect("stream");
    drop(sender);

    let mut tokens = String::new();
    let mut usage = None;
    while let Some(event) = receiver.recv().await {
        match event {
            AppEvent::Token(delta) => tokens.push_str(&delta),
            AppEvent::Usage(stats) => usage = Some(stats),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(tokens, "hi there");
    assert_eq!(usage.map(|stats| stats.completion_tokens), Some(2));
}

#[tokio::test]
async fn model_routes_report_status() {
    let (client, _models) = start(&["ok"]).await;

    let list = client.list_models().await.expect("models");
    assert_eq!(list.models, vec![MODEL]);
    assert_eq!(list.active.as_deref(), Some(MODEL));

    let missing = client.set_model("ghost.gguf").await.expect("reply");
    assert_eq!(missing.status, Status::Error);

    let switched = client.set_model(MODEL).await.expect("reply");
    assert_eq!(switched.status, Status::Success);
    assert_eq!(switched.model.as_deref(), Some(MODEL));

    let reset = client.reset().await.expect("reset");
    assert_eq!(reset.status, Status::Success);
}

#[tokio::test]
async fn unreachable_server_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = LuminoClient::new(format!("http://{addr}"));
    let err = client.chat("hello").await.unwrap_err();
    assert!(format!("{err:#}").contains("cannot connect to server"));
}
