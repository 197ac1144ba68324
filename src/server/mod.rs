// src/server/mod.rs

//! Top-level server bootstrap: builds the shared `ServerState`, registers
//! the Prometheus metrics, binds the listening port, and serves the router
//! until a shutdown signal arrives.

mod auth;
mod routes;

pub use routes::build as build_router;

use crate::config::OperatorConfig;
use crate::core::metrics;
use crate::core::state::ServerState;
use crate::core::webhook;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Runs the operator to completion: binds `config.bind_addr()` and serves
/// every route in §6 until SIGINT/SIGTERM (or Ctrl-C on Windows).
pub async fn run(config: OperatorConfig) -> Result<()> {
    metrics::register(&config.metrics_prefix);

    let state = Arc::new(ServerState::new(config));
    state
        .webhook
        .post_operator_event(webhook::COLOR_READY, "Operator is online...")
        .await;

    let addr = state.config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, clusters = state.slots.len(), "cluster operator listening");

    let router = routes::build(state.clone());

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(await_shutdown_signal())
        .await
        .context("server loop exited with an error");

    state
        .webhook
        .post_operator_event(webhook::COLOR_DISCONNECTING, "Operator is going offline...")
        .await;

    result
}

/// Waits for SIGINT or SIGTERM on Unix, Ctrl-C on Windows. Mirrors the
/// teacher's platform-specific shutdown wait, scaled down to this server's
/// single listener (no per-connection shutdown broadcast needed: websocket
/// tasks are torn down by axum when the listener stops accepting).
async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, shutting down"),
            _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
        }
    }
    #[cfg(windows)]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received, shutting down");
    }
}
