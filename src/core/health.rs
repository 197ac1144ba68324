// src/core/health.rs

//! Per-slot health check: mirrors `Cluster.StartHealthCheck` in
//! `pkg/cluster.go` — a 5-second ticker that, once a slot has reached
//! `Ready`, expects a `PingAck` between ticks. A tick that finds the pong
//! flag still unset terminates the slot with close code 4001.

use crate::core::cluster::{ClusterSlot, SlotState};
use crate::core::protocol::MessageType;
use crate::core::webhook::{self, WebhookClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const PING_INTERVAL: Duration = Duration::from_secs(5);
pub const UNHEALTHY_CLOSE_CODE: u16 = 4001;
pub const UNHEALTHY_CLOSE_REASON: &str = "No ping received";

/// Spawns the ticking task for one slot and stores its `AbortHandle` on the
/// slot so `ClusterSlot::terminate` can stop it. Only ever called once per
/// connection, right after the slot enters `Connecting`.
pub fn spawn(slot: Arc<ClusterSlot>, webhook: WebhookClient) {
    let handle = tokio::spawn(run_tick_loop(slot.clone(), webhook)).abort_handle();
    slot.set_health_check_handle(handle);
}

async fn run_tick_loop(slot: Arc<ClusterSlot>, webhook: WebhookClient) {
    let mut interval = tokio::time::interval(PING_INTERVAL);
    interval.tick().await; // first tick fires immediately; skip it.
    loop {
        interval.tick().await;
        if slot.state() != SlotState::Ready {
            continue;
        }
        if !slot.pong_received() {
            warn!(
                slot = slot.id,
                "cluster has not responded to the last ping, terminating connection"
            );
            slot.terminate(Some((UNHEALTHY_CLOSE_CODE, UNHEALTHY_CLOSE_REASON)))
                .await;
            webhook
                .post_cluster_event(&slot, webhook::COLOR_DISCONNECTING, "unhealthy")
                .await;
            return;
        }
        slot.set_pong_received(false);
        let _ = slot.send_empty(MessageType::Ping).await;
    }
}
