// src/main.rs

//! Entry point for the cluster operator binary: loads configuration,
//! initializes structured logging, and hands off to `server::run`.

use anyhow::Result;
use cluster_operator::config::OperatorConfig;
use cluster_operator::server;
use std::env;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("config.json");

    let config = match OperatorConfig::from_file(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration from \"{config_path}\": {err:#}");
            std::process::exit(1);
        }
    };

    if let Err(err) = server::run(config).await {
        error!("server exited with an error: {err:#}");
        return Err(err);
    }

    Ok(())
}
