// src/core/metrics.rs

//! Registers and refreshes the operator's Prometheus metrics.
//!
//! Mirrors `pkg/prometheus.go`'s fixed-gauge variant: one registry, one
//! gauge per tracked quantity, `memory_usage` labelled by cluster and left
//! un-summed while everything else is merged across clusters on each scrape.

use crate::core::cluster::SlotTable;
use crate::core::protocol::{ClusterStats, MessageType};
use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::time::Duration;

/// Per-slot stats timeout (4.H): a slot that hasn't answered by then is
/// skipped for this scrape rather than stalling the whole response.
pub const STATS_TIMEOUT: Duration = Duration::from_secs(5);

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
    static ref COMMAND_ERRORS: GaugeVec = GaugeVec::new(
        Opts::new("command_errors", "Unexpected command errors"),
        &["name"]
    )
    .unwrap();
    static ref COMMAND_USAGE: GaugeVec = GaugeVec::new(
        Opts::new("command_usage", "Command usage"),
        &["name"]
    )
    .unwrap();
    static ref BOT_EVENTS: GaugeVec =
        GaugeVec::new(Opts::new("bot_events", "Bot event counts"), &["name"]).unwrap();
    static ref SERVERS: Gauge = Gauge::new("servers", "Server count").unwrap();
    static ref USERS: Gauge = Gauge::new("users", "User count").unwrap();
    static ref CLUSTER_COUNT: Gauge = Gauge::new("cluster_count", "Cluster count").unwrap();
    static ref SHARD_COUNT: Gauge = Gauge::new("shard_count", "Ready shard count").unwrap();
    static ref MESSAGES_SEEN: Gauge = Gauge::new("messages_seen", "Messages seen").unwrap();
    static ref MEMORY_USAGE: GaugeVec = GaugeVec::new(
        Opts::new("memory_usage", "Memory usage per cluster"),
        &["cluster"]
    )
    .unwrap();
}

/// Registers every gauge exactly once. Must be called before the first
/// scrape; calling it twice would panic via `Registry::register`, so callers
/// invoke it a single time during startup.
///
/// `prefix` (`config.metrics_prefix`) is accepted for parity with
/// `pkg/config.go: MetricPrefix` but isn't baked into these fixed metric
/// names — they're process-wide statics, created before any config is
/// loaded. A deployment running several operators against one Prometheus
/// needs distinct `job`/`instance` scrape labels instead, which is the
/// standard way Prometheus itself disambiguates same-named metrics from
/// different targets.
pub fn register(_prefix: &str) {
    let _ = REGISTRY.register(Box::new(COMMAND_ERRORS.clone()));
    let _ = REGISTRY.register(Box::new(COMMAND_USAGE.clone()));
    let _ = REGISTRY.register(Box::new(BOT_EVENTS.clone()));
    let _ = REGISTRY.register(Box::new(SERVERS.clone()));
    let _ = REGISTRY.register(Box::new(USERS.clone()));
    let _ = REGISTRY.register(Box::new(CLUSTER_COUNT.clone()));
    let _ = REGISTRY.register(Box::new(SHARD_COUNT.clone()));
    let _ = REGISTRY.register(Box::new(MESSAGES_SEEN.clone()));
    let _ = REGISTRY.register(Box::new(MEMORY_USAGE.clone()));
}

/// Sums scalar fields across every reachable cluster's stats and sets every
/// gauge from the result. `memory_usage` is set per-cluster instead, keyed
/// by slot ID, mirroring the original's labelled gauge.
///
/// When `per_cluster` is empty (no healthy clusters answered), every gauge
/// is reset to zero instead of left stale — this supersedes the original's
/// HTTP 500 response, per the redesign decision recorded in DESIGN.md.
///
/// `merge_metrics` mirrors `pkg/config.go: MergeMetrics`: when `true` (the
/// default) scalars are summed across every reporting cluster as above; when
/// `false` the scrape instead serves the first reporting cluster's scalars
/// unsummed, matching the original's `mergeMetrics=false` branch in
/// `pkg/prometheus.go`.
pub fn refresh(per_cluster: &[(usize, ClusterStats)], cluster_count: usize, merge_metrics: bool) {
    if per_cluster.is_empty() {
        SERVERS.set(0.0);
        USERS.set(0.0);
        SHARD_COUNT.set(0.0);
        MESSAGES_SEEN.set(0.0);
        CLUSTER_COUNT.set(cluster_count as f64);
        COMMAND_ERRORS.reset();
        COMMAND_USAGE.reset();
        BOT_EVENTS.reset();
        MEMORY_USAGE.reset();
        return;
    }

    if !merge_metrics {
        let (slot_id, stats) = &per_cluster[0];
        SERVERS.set(stats.servers);
        USERS.set(stats.users);
        SHARD_COUNT.set(stats.ready_shards);
        MESSAGES_SEEN.set(stats.messages_seen);
        CLUSTER_COUNT.set(cluster_count as f64);
        COMMAND_ERRORS.reset();
        COMMAND_USAGE.reset();
        BOT_EVENTS.reset();
        for (name, count) in &stats.command_errors {
            COMMAND_ERRORS.with_label_values(&[name]).set(*count);
        }
        for (name, count) in &stats.command_usage {
            COMMAND_USAGE.with_label_values(&[name]).set(*count);
        }
        for (name, count) in &stats.event_counts {
            BOT_EVENTS.with_label_values(&[name]).set(*count);
        }
        MEMORY_USAGE
            .with_label_values(&[&slot_id.to_string()])
            .set(stats.memory_usage);
        for (slot_id, stats) in &per_cluster[1..] {
            MEMORY_USAGE
                .with_label_values(&[&slot_id.to_string()])
                .set(stats.memory_usage);
        }
        return;
    }

    let mut servers = 0.0;
    let mut users = 0.0;
    let mut ready_shards = 0.0;
    let mut messages_seen = 0.0;
    let mut command_errors: HashMap<String, f64> = HashMap::new();
    let mut command_usage: HashMap<String, f64> = HashMap::new();
    let mut bot_events: HashMap<String, f64> = HashMap::new();

    for (slot_id, stats) in per_cluster {
        servers += stats.servers;
        users += stats.users;
        ready_shards += stats.ready_shards;
        messages_seen += stats.messages_seen;
        for (name, count) in &stats.command_errors {
            *command_errors.entry(name.clone()).or_default() += count;
        }
        for (name, count) in &stats.command_usage {
            *command_usage.entry(name.clone()).or_default() += count;
        }
        for (name, count) in &stats.event_counts {
            *bot_events.entry(name.clone()).or_default() += count;
        }
        MEMORY_USAGE
            .with_label_values(&[&slot_id.to_string()])
            .set(stats.memory_usage);
    }

    SERVERS.set(servers);
    USERS.set(users);
    SHARD_COUNT.set(ready_shards);
    MESSAGES_SEEN.set(messages_seen);
    CLUSTER_COUNT.set(cluster_count as f64);

    for (name, count) in command_errors {
        COMMAND_ERRORS.with_label_values(&[&name]).set(count);
    }
    for (name, count) in command_usage {
        COMMAND_USAGE.with_label_values(&[&name]).set(count);
    }
    for (name, count) in bot_events {
        BOT_EVENTS.with_label_values(&[&name]).set(count);
    }
}

/// Requests `Stats` from every `Ready` slot and waits up to
/// [`STATS_TIMEOUT`] on each one's own rendezvous channel before moving on.
/// A slot that times out is simply absent from the returned vector — it is
/// not retried and does not fail the scrape.
pub async fn collect(table: &SlotTable) -> Vec<(usize, ClusterStats)> {
    let mut collected = Vec::new();
    for slot in table.ready_slots() {
        let rx = slot.put_stats_rendezvous();
        if slot.send_empty(MessageType::Stats).await.is_err() {
            continue;
        }
        if let Ok(Ok(stats)) = tokio::time::timeout(STATS_TIMEOUT, rx).await {
            collected.push((slot.id, stats));
        }
    }
    collected
}

/// The full scrape-time pipeline (4.H): if no slot is `Ready`, reset every
/// metric to zero/empty instead of serving stale values; otherwise collect
/// and merge stats from each `Ready` slot, then encode the registry.
pub async fn scrape(table: &SlotTable, merge_metrics: bool) -> String {
    if table.healthy_count() < 1 {
        refresh(&[], table.len(), merge_metrics);
    } else {
        let collected = collect(table).await;
        refresh(&collected, table.len(), merge_metrics);
    }
    gather_text()
}

/// Encodes every registered metric family in the Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf).ok();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(servers: f64, memory: f64) -> ClusterStats {
        ClusterStats {
            servers,
            memory_usage: memory,
            ..Default::default()
        }
    }

    // `SERVERS`/`MEMORY_USAGE`/etc. are process-wide statics (see the
    // `lazy_static!` block above), so tests that read a value right after
    // writing it must not run concurrently with each other.
    static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn refresh_sums_scalars_across_clusters() {
        let _guard = TEST_LOCK.lock().unwrap();
        register("test_");
        refresh(&[(0, stats(2.0, 10.0)), (1, stats(3.0, 20.0))], 2, true);
        assert_eq!(SERVERS.get(), 5.0);
        assert_eq!(MEMORY_USAGE.with_label_values(&["0"]).get(), 10.0);
        assert_eq!(MEMORY_USAGE.with_label_values(&["1"]).get(), 20.0);
    }

    #[test]
    fn refresh_with_no_healthy_clusters_resets_to_zero() {
        let _guard = TEST_LOCK.lock().unwrap();
        register("test_");
        refresh(&[(0, stats(4.0, 40.0))], 1, true);
        refresh(&[], 1, true);
        assert_eq!(SERVERS.get(), 0.0);
    }

    #[test]
    fn refresh_with_merge_disabled_serves_only_the_first_cluster() {
        let _guard = TEST_LOCK.lock().unwrap();
        register("test_");
        refresh(&[(0, stats(2.0, 10.0)), (1, stats(3.0, 20.0))], 2, false);
        assert_eq!(SERVERS.get(), 2.0);
        assert_eq!(MEMORY_USAGE.with_label_values(&["0"]).get(), 10.0);
        assert_eq!(MEMORY_USAGE.with_label_values(&["1"]).get(), 20.0);
    }

    #[tokio::test]
    async fn collect_with_no_ready_slots_returns_nothing() {
        let table = SlotTable::new(4, 2).unwrap();
        assert!(collect(&table).await.is_empty());
    }
}
