// src/core/webhook.rs

//! Posts human-readable lifecycle events to an external webhook as
//! Discord-style embeds. Mirrors `pkg/log.go`'s `Logger`. Best-effort: a
//! failed post is logged and otherwise ignored, never propagated to the
//! caller.

use crate::core::cluster::ClusterSlot;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

pub const COLOR_CONNECTING: u32 = 0x0E_6C_F7;
pub const COLOR_READY: u32 = 0x00_DB_62;
pub const COLOR_DISCONNECTING: u32 = 0xFF_44_44;

#[derive(Serialize)]
struct Embed {
    color: u32,
    description: String,
}

#[derive(Serialize)]
struct WebhookBody {
    embeds: [Embed; 1],
}

#[derive(Clone)]
pub struct WebhookClient {
    url: Option<String>,
    env: String,
    enabled: bool,
    http: Client,
}

impl WebhookClient {
    pub fn new(url: Option<String>, env: String, enabled: bool) -> Self {
        Self {
            url,
            env,
            enabled,
            http: Client::new(),
        }
    }

    fn current_date() -> String {
        chrono::Local::now().format("%B %d %Y %H:%M:%S").to_string()
    }

    /// Posts a cluster lifecycle event:
    /// `` `[date]` | Cluster `N` {event} | Shards `first` - `last` | {env} ``.
    pub async fn post_cluster_event(&self, slot: &ClusterSlot, color: u32, event: &str) {
        let description = format!(
            "`[{}]` | Cluster `{}` {} | Shards `{}` - `{}` | {}",
            Self::current_date(),
            slot.id,
            event,
            slot.block.first_shard_id(),
            slot.block.last_shard_id(),
            self.env,
        );
        self.post(color, description, event).await;
    }

    /// Posts an operator-wide lifecycle event: `` `[date]` | {event} | {env} ``.
    pub async fn post_operator_event(&self, color: u32, event: &str) {
        let description = format!("`[{}]` | {} | {}", Self::current_date(), event, self.env);
        self.post(color, description, event).await;
    }

    async fn post(&self, color: u32, description: String, event: &str) {
        if !self.enabled {
            return;
        }
        let Some(url) = self.url.as_deref() else {
            return;
        };
        let body = WebhookBody {
            embeds: [Embed { color, description }],
        };
        let started = std::time::Instant::now();
        match self.http.post(url).json(&body).send().await {
            Ok(resp) => {
                debug!(
                    status = %resp.status(),
                    elapsed_ms = started.elapsed().as_millis(),
                    event,
                    "posted webhook log"
                );
            }
            Err(err) => {
                error!(event, error = %err, "failed to post webhook log");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cluster::partition;

    #[tokio::test]
    async fn a_disabled_client_never_attempts_a_request() {
        let client = WebhookClient::new(Some("http://127.0.0.1:1".to_string()), "test".into(), false);
        client.post_operator_event(COLOR_CONNECTING, "Operator is online...").await;
    }

    #[tokio::test]
    async fn a_missing_url_is_a_no_op_even_when_enabled() {
        let client = WebhookClient::new(None, "test".into(), true);
        client.post_operator_event(COLOR_READY, "Operator is online...").await;
    }

    #[test]
    fn cluster_event_description_matches_the_expected_shape() {
        let block = partition::partition(8, 2).unwrap().remove(0);
        let slot = ClusterSlot::new(0, block);
        assert_eq!(slot.block.first_shard_id(), 0);
        assert_eq!(slot.block.last_shard_id(), 3);
    }
}
