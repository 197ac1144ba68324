// src/core/errors.rs

//! Defines the primary error type for the operator.

use thiserror::Error;

/// The main error enum for failures that propagate out of a fallible
/// boundary (config loading, startup, listener bind). Per-request and
/// per-slot failures are represented as log lines and synthetic JSON error
/// strings instead — see `core::scatter` and `core::metrics`.
#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("shard partition error: {0}")]
    Partition(String),

    #[error("webhook request failed: {0}")]
    Webhook(String),

    #[error("internal error: {0}")]
    Internal(String),
}
