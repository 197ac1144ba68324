// src/connection/handler.rs

//! Drives one accepted `/ws` connection end to end: slot assignment,
//! message dispatch, and teardown. Mirrors `SocketHandler.ServeHTTP` and
//! `Cluster.HandleMessage` in the original: one read loop per connection,
//! one spawned task per inbound frame so a slow handler never stalls the
//! read loop.

use super::guard::ConnectionGuard;
use crate::core::cluster::{ClusterSlot, SlotState};
use crate::core::health;
use crate::core::protocol::{
    BroadcastEvalResponse, EntityResponse, EvalRequest, EvalRes, MessageType, Packet, ShardData,
};
use crate::core::scatter;
use crate::core::state::ServerState;
use crate::core::webhook;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Drives a single accepted, already-authenticated `/ws` connection until it
/// closes. Returns once the slot has been released.
pub async fn run(socket: WebSocket, state: Arc<ServerState>) {
    let (sink, mut stream) = socket.split();
    let sink = Arc::new(Mutex::new(sink));

    let slot = {
        let _permit = state.handshake_lock.lock().await;
        let Some(slot) = state.slots.next_available().cloned() else {
            warn!("no free cluster slots; rejecting connection");
            return;
        };
        slot.attach(sink);
        slot
    };

    let _guard = ConnectionGuard::new(slot.clone(), state.webhook.clone());

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                let Ok(packet) = serde_json::from_str::<Packet>(&text) else {
                    warn!(slot = slot.id, "dropping malformed frame");
                    continue;
                };
                // Dispatched on its own task so a slow handler (e.g. a
                // BroadcastEval's sequential scatter) never stalls the read
                // loop and, in turn, PingAck processing on this connection.
                let state = state.clone();
                let slot = slot.clone();
                tokio::spawn(async move {
                    handle_packet(&state, &slot, packet).await;
                });
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn handle_packet(state: &Arc<ServerState>, slot: &Arc<ClusterSlot>, packet: Packet) {
    let Some(message_type) = packet.message_type() else {
        warn!(slot = slot.id, ty = packet.ty, "unknown message type");
        return;
    };

    match message_type {
        MessageType::Handshaking => {
            if !matches!(slot.state(), SlotState::Connecting) {
                warn!(slot = slot.id, "ignoring Handshaking outside of Connecting state");
                return;
            }
            // Shard-block assignment happened under `state.handshake_lock` in
            // `run()`; the handshake action itself must be serialized under
            // the same lock so the health-check spawn, the "connecting" log,
            // and the `ShardData` send land atomically per slot (mirrors
            // `lock.Lock()` in `Cluster.HandleMessage`'s `Handshaking` case).
            let _guard = state.handshake_lock.lock().await;
            health::spawn(slot.clone(), state.webhook.clone());
            info!(
                slot = slot.id,
                first = slot.block.first_shard_id(),
                last = slot.block.last_shard_id(),
                "cluster handshaking, handing out shard assignment"
            );
            state
                .webhook
                .post_cluster_event(slot, webhook::COLOR_CONNECTING, "connecting")
                .await;
            let _ = slot
                .send(
                    MessageType::ShardData,
                    ShardData {
                        id: slot.id,
                        block: slot.block.clone(),
                    },
                )
                .await;
        }

        MessageType::PingAck => slot.set_pong_received(true),

        MessageType::Ready => {
            slot.set_state(SlotState::Ready);
            state
                .webhook
                .post_cluster_event(slot, webhook::COLOR_READY, "ready")
                .await;
        }

        MessageType::StatsAck => {
            if let Some(stats) = packet.body_as() {
                slot.deliver_stats(stats);
            }
        }

        MessageType::Eval => {
            if let Some(res) = packet.body_as::<EvalRes>() {
                state.eval_replies.deliver(&res.id, res);
            }
        }

        MessageType::EntityAck => {
            if let Some(res) = packet.body_as::<EntityResponse>() {
                state.entity_replies.deliver(&res.id, res);
            }
        }

        MessageType::BroadcastEval => {
            let Some(req) = packet.body_as::<EvalRequest>() else {
                return;
            };
            let timeout = if req.timeout > 0 {
                Duration::from_millis(req.timeout as u64)
            } else {
                Duration::from_secs(5)
            };
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
                || EvalRes::error(scatter::TIMED_OUT_ERROR),
                || EvalRes::error(scatter::NOT_READY_ERROR),
            )
            .await;
            let _ = slot
                .send(
                    MessageType::BroadcastEvalAck,
                    BroadcastEvalResponse {
                        id: req.id,
                        results,
                    },
                )
                .await;
        }

        // Server-to-client-only message types never arrive inbound.
        MessageType::ShardData
        | MessageType::Ping
        | MessageType::BroadcastEvalAck
        | MessageType::Stats
        | MessageType::Entity => {
            warn!(slot = slot.id, ?message_type, "ignoring outbound-only message type received inbound");
        }
    }
}
