// src/config.rs

//! Loads and validates the operator's JSON configuration file.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// A single Prometheus metric the operator should register and aggregate
/// across clusters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// The operator's full configuration, loaded once at startup from
/// `config.json` in the current working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub env: String,
    pub clusters: u32,
    pub shards: u32,
    pub auth: String,
    #[serde(default)]
    pub webhook: Option<String>,
    #[serde(default, rename = "metricsPrefix")]
    pub metrics_prefix: String,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
    #[serde(default, rename = "mergeMetrics")]
    pub merge_metrics: bool,
    #[serde(default, rename = "logEvents")]
    pub log_events: bool,
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3010
}

impl OperatorConfig {
    /// Reads and parses `path`, then validates it. Mirrors the original
    /// `config.json`-in-cwd convention rather than the teacher's TOML-based
    /// loader, since the wire format is part of this operator's own
    /// contract, not an arbitrary choice to modernize.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file at {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.env.is_empty() && self.log_events {
            bail!("`env` must be set when `logEvents` is enabled");
        }
        if self.clusters < 1 {
            bail!("`clusters` must be greater than 0");
        }
        if self.shards < 1 {
            bail!("`shards` must be greater than 0");
        }
        if self.shards % self.clusters != 0 {
            bail!(
                "`shards` ({}) must be evenly divisible by `clusters` ({})",
                self.shards,
                self.clusters
            );
        }
        if self.auth.is_empty() {
            bail!("`auth` must be set");
        }
        if !self.metrics.is_empty() && self.metrics_prefix.is_empty() {
            warn!(
                "metrics are configured but metricsPrefix is empty; a metric named \"ping\" \
                 could collide with another cluster operator on the same Prometheus instance"
            );
        }
        for (i, metric) in self.metrics.iter().enumerate() {
            if metric.name.is_empty() {
                bail!("metrics[{i}].name is required");
            }
            if metric.description.is_empty() {
                bail!("metrics[{i}].description is required");
            }
        }
        Ok(())
    }

    pub fn metric_key(&self, key: &str) -> String {
        format!("{}{}", self.metrics_prefix, key)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> OperatorConfig {
        OperatorConfig {
            ip: default_ip(),
            port: default_port(),
            env: "production".to_string(),
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
    fn rejects_uneven_shard_division() {
        let mut config = base_config();
        config.shards = 10;
        config.clusters = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_missing_env_when_logging_is_enabled() {
        let mut config = base_config();
        config.env = String::new();
        config.log_events = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_auth() {
        let mut config = base_config();
        config.auth = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_a_well_formed_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn metric_key_applies_the_configured_prefix() {
        let mut config = base_config();
        config.metrics_prefix = "prod_".to_string();
        assert_eq!(config.metric_key("servers"), "prod_servers");
    }
}
