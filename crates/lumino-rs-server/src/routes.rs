//! Route table and handlers.

use crate::AppContext;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use log::{debug, info, warn};
use lumino_rs_core::reply_stream;
use lumino_rs_protocol::{
    CHAT_ROUTE, ChatReply, ChatRequest, ErrorBody, MODELS_ROUTE, ModelList, NDJSON_CONTENT_TYPE,
    RESET_ROUTE, SET_MODEL_ROUTE, SetModelRequest, StatusReply, StreamLine,
};
use std::convert::Infallible;

/// Build the route table over `ctx`.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route(CHAT_ROUTE, post(chat))
        .route(MODELS_ROUTE, get(list_models))
        .route(SET_MODEL_ROUTE, post(set_model))
        .route(RESET_ROUTE, post(reset))
        .with_state(ctx)
}

async fn chat(State(ctx): State<AppContext>, Json(request): Json<ChatRequest>) -> Response {
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "empty message".to_string(),
            }),
        )
            .into_response();
    }

    let expanded = ctx.expand(&request.message);
    debug!(
        "chat request (stream={}, len={}, files={})",
        request.stream,
        expanded.message.len(),
        expanded.files_read.len()
    );

    if request.stream {
        let lines = reply_stream(ctx.engine.clone(), expanded.message)
            .map(|event| Ok::<_, Infallible>(StreamLine::from(event).to_ndjson()));
        return (
            [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
            Body::from_stream(lines),
        )
            .into_response();
    }

    let reply = ctx.engine.lock().await.generate(&expanded.message).await;
    Json(ChatReply {
        response: reply.content,
        usage: reply.usage,
        files_read: expanded.files_read,
    })
    .into_response()
}

async fn list_models(State(ctx): State<AppContext>) -> Response {
    let models = match ctx.registry.list_available_models() {
        Ok(models) => models,
        Err(err) => {
            warn!("failed to list models (err={err})");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: err.to_string(),
                }),
            )
                .into_response();
        }
    };
    let active = ctx
        .engine
        .lock()
        .await
        .active_profile()
        .map(|profile| profile.id.clone());
    Json(ModelList { models, active }).into_response()
}

async fn set_model(
    State(ctx): State<AppContext>,
    Json(request): Json<SetModelRequest>,
) -> Response {
    let mut engine = ctx.engine.lock().await;
    match engine.switch_model(&request.model).await {
        Ok(profile) => {
            info!("active model switched (id={})", profile.id);
            let message = format!("Switched to {} ({} mode)", profile.id, profile.mode());
            Json(StatusReply::success(message).with_model(profile.id.clone())).into_response()
        }
        Err(err) => {
            let status = if err.is_not_found() {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            warn!(
                "model switch failed (model={}, status={}, err={err})",
                request.model, status
            );
            (
                status,
                Json(StatusReply::failure(err.to_string()).with_model(request.model)),
            )
                .into_response()
        }
    }
}

async fn reset(State(ctx): State<AppContext>) -> Response {
    ctx.engine.lock().await.clear_history();
    Json(StatusReply::success("Conversation history cleared")).into_response()
}
