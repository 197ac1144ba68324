// src/core/cluster/slot.rs

//! A single cluster slot: the operator-side record of one expected cluster.

use crate::core::cluster::partition::Block;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, oneshot};

/// The lifecycle state of a slot. Transitions only along
/// `Waiting -> Connecting -> Ready -> Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Waiting,
    Connecting,
    Ready,
}

/// The write half of a connected cluster's websocket, serialized so at most
/// one frame is ever in flight on the connection at a time.
pub type WriteHalf = Mutex<SplitSink<WebSocket, Message>>;

/// One entry in the fixed-size slot table.
///
/// Created once at startup with `state = Waiting` and never destroyed; only
/// its interior fields mutate across reconnects.
pub struct ClusterSlot {
    pub id: usize,
    pub block: Block,
    state: parking_lot::RwLock<SlotState>,
    conn: parking_lot::Mutex<Option<std::sync::Arc<WriteHalf>>>,
    /// Set by `PingAck`, cleared by the health-check tick. Starts true so the
    /// first tick after reaching `Ready` doesn't immediately fail the slot.
    pong_received: AtomicBool,
    /// Cancels the slot's health-check timer task on termination.
    health_check_cancel: parking_lot::Mutex<Option<tokio::task::AbortHandle>>,
    /// Rendezvous point for a single in-flight `Stats` request.
    stats_tx: parking_lot::Mutex<Option<oneshot::Sender<crate::core::protocol::ClusterStats>>>,
}

impl ClusterSlot {
    pub fn new(id: usize, block: Block) -> Self {
        Self {
            id,
            block,
            state: parking_lot::RwLock::new(SlotState::Waiting),
            conn: parking_lot::Mutex::new(None),
            pong_received: AtomicBool::new(true),
            health_check_cancel: parking_lot::Mutex::new(None),
            stats_tx: parking_lot::Mutex::new(None),
        }
    }

    pub fn state(&self) -> SlotState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SlotState::Ready
    }

    pub fn set_state(&self, new_state: SlotState) {
        *self.state.write() = new_state;
    }

    /// Assigns a freshly-upgraded connection to this slot and marks it
    /// `Connecting`. Only called while holding the server's handshake lock.
    pub fn attach(&self, writer: std::sync::Arc<WriteHalf>) {
        *self.conn.lock() = Some(writer);
        self.set_state(SlotState::Connecting);
    }

    pub fn connection(&self) -> Option<std::sync::Arc<WriteHalf>> {
        self.conn.lock().clone()
    }

    pub fn set_health_check_handle(&self, handle: tokio::task::AbortHandle) {
        *self.health_check_cancel.lock() = Some(handle);
    }

    pub fn take_health_check_handle(&self) -> Option<tokio::task::AbortHandle> {
        self.health_check_cancel.lock().take()
    }

    pub fn pong_received(&self) -> bool {
        self.pong_received.load(Ordering::SeqCst)
    }

    pub fn set_pong_received(&self, value: bool) {
        self.pong_received.store(value, Ordering::SeqCst);
    }

    pub fn put_stats_rendezvous(&self) -> oneshot::Receiver<crate::core::protocol::ClusterStats> {
        let (tx, rx) = oneshot::channel();
        *self.stats_tx.lock() = Some(tx);
        rx
    }

    /// Delivers a `StatsAck` reply non-blocking; drops silently if nobody is
    /// waiting (consistent with the Go implementation's unbuffered channel
    /// send, which only ever had one reader at a time).
    pub fn deliver_stats(&self, stats: crate::core::protocol::ClusterStats) {
        if let Some(tx) = self.stats_tx.lock().take() {
            let _ = tx.send(stats);
        }
    }

    /// Sends one frame on this slot's connection, serialized by the write
    /// lock. Best-effort: write failures are logged by the caller, not
    /// propagated, matching the original's fire-and-forget `Write`.
    pub async fn send<T: Serialize>(
        &self,
        ty: crate::core::protocol::MessageType,
        body: T,
    ) -> Result<(), SendError> {
        let Some(conn) = self.connection() else {
            return Err(SendError::NotConnected);
        };
        let packet =
            crate::core::protocol::Packet::new(ty, body).map_err(|_| SendError::Encode)?;
        let text = serde_json::to_string(&packet).map_err(|_| SendError::Encode)?;
        use futures::SinkExt;
        conn.lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| SendError::Io)
    }

    pub async fn send_empty(
        &self,
        ty: crate::core::protocol::MessageType,
    ) -> Result<(), SendError> {
        let Some(conn) = self.connection() else {
            return Err(SendError::NotConnected);
        };
        let packet = crate::core::protocol::Packet::empty(ty);
        let text = serde_json::to_string(&packet).map_err(|_| SendError::Encode)?;
        use futures::SinkExt;
        conn.lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| SendError::Io)
    }

    /// Closes the connection (if any), optionally with a close code/reason,
    /// stops the health-check timer, and resets the slot to `Waiting`.
    /// Idempotent with respect to an already-`Waiting` slot.
    pub async fn terminate(&self, close: Option<(u16, &str)>) {
        if let Some(handle) = self.take_health_check_handle() {
            handle.abort();
        }
        if let Some(conn) = self.conn.lock().take() {
            if let Some((code, reason)) = close {
                use axum::extract::ws::CloseFrame;
                use futures::SinkExt;
                let frame = Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.to_string().into(),
                }));
                let _ = conn.lock().await.send(frame).await;
            }
            use futures::SinkExt;
            let _ = conn.lock().await.close().await;
        }
        self.set_state(SlotState::Waiting);
        self.set_pong_received(true);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("slot has no active connection")]
    NotConnected,
    #[error("failed to encode outbound frame")]
    Encode,
    #[error("failed to write outbound frame")]
    Io,
}
