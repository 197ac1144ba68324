// src/server/routes.rs

//! HTTP and websocket route handlers. Builds the single `axum::Router` that
//! serves every endpoint in §6: `/ws`, `/metrics`, `/eval`, `/entity`,
//! `/shardCount`, `/relay`. Auth is a layer (see `super::auth`) applied to
//! the whole router, mirroring the repeated per-handler header check in the
//! original collapsing into one middleware.

use crate::core::metrics;
use crate::core::protocol::{ApiResponse, EntityRequest, EntityResponse, EvalRequest, EvalRes, MessageType, Packet};
use crate::core::scatter::{self, NOT_READY_ERROR, TIMED_OUT_ERROR};
use crate::core::state::ServerState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub fn build(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/metrics", get(metrics_handler))
        .route("/eval", post(eval_handler))
        .route("/entity", post(entity_handler))
        .route("/shardCount", get(shard_count_handler))
        .route("/relay", get(relay_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            super::auth::require_auth,
        ))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| crate::connection::run(socket, state))
}

async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let body = metrics::scrape(&state.slots, state.config.merge_metrics).await;
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

#[derive(Debug, Deserialize)]
struct EvalHttpRequest {
    id: String,
    code: String,
    #[serde(default)]
    timeout: i64,
}

async fn eval_handler(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<EvalHttpRequest>,
) -> impl IntoResponse {
    if req.id.is_empty() || req.code.is_empty() || req.timeout <= 0 {
        return bad_request("id, code and a positive timeout (ms) are required");
    }

    let timeout = Duration::from_millis(req.timeout as u64);
    let results = scatter::scatter(
        &state.slots,
        &state.eval_replies,
        MessageType::Eval,
        timeout,
        |id| EvalRequest {
            id: id.to_string(),
            code: req.code.clone(),
            timeout: -1,
        },
        || EvalRes::error(TIMED_OUT_ERROR),
        || EvalRes::error(NOT_READY_ERROR),
    )
    .await;

    (StatusCode::OK, Json(ApiResponse::ok(results))).into_response()
}

#[derive(Debug, Deserialize)]
struct EntityHttpRequest {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    args: Option<serde_json::Value>,
}

const ENTITY_TIMEOUT: Duration = Duration::from_secs(5);

async fn entity_handler(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<EntityHttpRequest>,
) -> impl IntoResponse {
    if req.id.is_empty() || req.kind.is_empty() {
        return bad_request("id and type are required");
    }

    let results = scatter::scatter(
        &state.slots,
        &state.entity_replies,
        MessageType::Entity,
        ENTITY_TIMEOUT,
        |id| EntityRequest {
            id: id.to_string(),
            kind: req.kind.clone(),
            args: req.args.clone(),
        },
        || EntityResponse::error(TIMED_OUT_ERROR),
        || EntityResponse::error(NOT_READY_ERROR),
    )
    .await;

    (StatusCode::OK, Json(ApiResponse::ok(results))).into_response()
}

#[derive(Debug, Serialize)]
struct ShardCountResponse {
    shards: u32,
    #[serde(rename = "clusterCount")]
    cluster_count: u32,
}

async fn shard_count_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::ok(ShardCountResponse {
            shards: state.config.shards,
            cluster_count: state.config.clusters,
        })),
    )
}

async fn relay_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| relay_loop(socket, state))
}

async fn relay_loop(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sink, mut stream) = socket.split();
    let (client_id, mut outbound) = state.relay.join();

    let forward = async {
        while let Some(message) = outbound.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    };

    let receive = async {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    let Ok(packet) = serde_json::from_str::<Packet>(&text) else {
                        warn!("dropping malformed relay frame");
                        continue;
                    };
                    state.relay.handle_inbound(packet);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = forward => {},
        _ = receive => {},
    }
    state.relay.leave(client_id);
}

fn bad_request(message: &str) -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::err(message))).into_response()
}
