// src/connection/guard.rs

//! RAII guard that returns a cluster slot to `Waiting` when its connection's
//! handling task exits for any reason — normal disconnect, protocol error,
//! or a panic unwinding through the task.

use crate::core::cluster::{ClusterSlot, SlotState};
use crate::core::webhook::{self, WebhookClient};
use std::sync::Arc;
use tracing::debug;

pub struct ConnectionGuard {
    slot: Arc<ClusterSlot>,
    webhook: WebhookClient,
}

impl ConnectionGuard {
    pub fn new(slot: Arc<ClusterSlot>, webhook: WebhookClient) -> Self {
        Self { slot, webhook }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let slot = self.slot.clone();
        let webhook = self.webhook.clone();
        debug!(slot = slot.id, "releasing slot on connection teardown");
        // The health check may have already terminated (and logged) this
        // slot — e.g. a missed pong closes the connection, which then also
        // unwinds the read loop and drops this guard. Only post the
        // "disconnected" event when the slot wasn't already put back to
        // `Waiting` by someone else, so a health-driven termination logs
        // "unhealthy" exactly once instead of "unhealthy" then "disconnected".
        let already_terminated = slot.state() == SlotState::Waiting;
        tokio::spawn(async move {
            slot.terminate(None).await;
            if !already_terminated {
                webhook
                    .post_cluster_event(&slot, webhook::COLOR_DISCONNECTING, "disconnected")
                    .await;
            }
        });
    }
}
