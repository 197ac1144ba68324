// src/core/state.rs

//! The central `ServerState`: everything a connection handler, an HTTP
//! route, or a background task needs, wrapped in a single `Arc` and passed
//! around rather than reached for through globals.

use crate::config::OperatorConfig;
use crate::core::cluster::SlotTable;
use crate::core::correlation::CorrelationRegistry;
use crate::core::protocol::{EntityResponse, EvalRes};
use crate::core::relay::RelayBus;
use crate::core::webhook::WebhookClient;
use tokio::sync::Mutex;

/// The central struct holding all shared, operator-wide state. Wrapped in an
/// `Arc` and cloned into every connection task and HTTP handler.
pub struct ServerState {
    pub config: OperatorConfig,
    pub slots: SlotTable,
    pub eval_replies: CorrelationRegistry<EvalRes>,
    pub entity_replies: CorrelationRegistry<EntityResponse>,
    pub relay: RelayBus,
    pub webhook: WebhookClient,
    /// Serializes slot assignment against the first `ShardData` send, so two
    /// simultaneous handshakes can't race onto the same slot. Mirrors the
    /// package-level `lock` mutex guarding `NextClusterID` in `server.go`.
    pub handshake_lock: Mutex<()>,
}

impl ServerState {
    pub fn new(config: OperatorConfig) -> Self {
        let slots = SlotTable::new(config.shards, config.clusters)
            .expect("config was validated before ServerState::new was called");
        let webhook = WebhookClient::new(config.webhook.clone(), config.env.clone(), config.log_events);
        Self {
            config,
            slots,
            eval_replies: CorrelationRegistry::new(),
            entity_replies: CorrelationRegistry::new(),
            relay: RelayBus::new(),
            webhook,
            handshake_lock: Mutex::new(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OperatorConfig {
        OperatorConfig {
            ip: "127.0.0.1".to_string(),
            port: 3010,
            env: "test".to_string(),
            clusters: 4,
            shards: 16,
            auth: "secret".to_string(),
            webhook: None,
            metrics_prefix: String::new(),
            metrics: vec![],
            merge_metrics: true,
            log_events: false,
        }
    }

    #[test]
    fn new_builds_a_slot_table_matching_the_configured_cluster_count() {
        let state = ServerState::new(config());
        assert_eq!(state.slots.len(), 4);
    }
}
