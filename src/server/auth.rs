// src/server/auth.rs

//! Shared-secret authorization check applied to every HTTP and websocket
//! route. Mirrors the repeated `r.Header.Get("Authorization") != Config.Auth`
//! guard duplicated across `eval.go`, `pkg/entity.go`, `pkg/expectedShards.go`,
//! and `server.go`'s `SocketHandler`, collapsed into one `axum` middleware.

use crate::core::protocol::ApiResponse;
use crate::core::state::ServerState;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub async fn require_auth(
    State(state): State<Arc<ServerState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    match header {
        None => unauthorized("Unauthorized"),
        Some(value) if value != state.config.auth => unauthorized("Forbidden"),
        Some(_) => next.run(request).await,
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        axum::Json(ApiResponse::<()>::err(message)),
    )
        .into_response()
}
