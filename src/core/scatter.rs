// src/core/scatter.rs

//! Scatter/gather executor: visits every slot sequentially, issuing one
//! request per ready slot and collecting either its reply or a synthetic
//! error. Mirrors `EvalHandler.ServeHTTP`, `EntityHandler.ServeHTTP`, and
//! the `BroadcastEval` arm of `Cluster.HandleMessage`, all of which share
//! this same shape in the original.

use crate::core::cluster::SlotTable;
use crate::core::correlation::CorrelationRegistry;
use crate::core::protocol::{CorrelatedReply, MessageType};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

pub const NOT_READY_ERROR: &str = "Cluster is not ready!";
pub const TIMED_OUT_ERROR: &str = "Response timed out";

/// Visits every slot in `table` in ID order. For each slot:
/// - not `Ready` → `on_not_ready()` is pushed straight into the result, no
///   request sent.
/// - `Ready` → a fresh correlation ID is registered in `registry`, `body` is
///   sent as `message_type`, and the call waits up to `timeout` for a reply
///   via `registry`; a late or missing reply produces `on_timeout()`.
///
/// Generic over the reply type `T` so the same executor drives both the
/// `Eval`/`BroadcastEval` path (`T = EvalRes`) and the `Entity` path
/// (`T = EntityResponse`).
pub async fn scatter<T, B, MkBody, MkTimeout, MkNotReady>(
    table: &SlotTable,
    registry: &CorrelationRegistry<T>,
    message_type: MessageType,
    timeout: Duration,
    mut make_body: MkBody,
    mut on_timeout: MkTimeout,
    mut on_not_ready: MkNotReady,
) -> Vec<T>
where
    B: Serialize,
    T: CorrelatedReply,
    MkBody: FnMut(&str) -> B,
    MkTimeout: FnMut() -> T,
    MkNotReady: FnMut() -> T,
{
    let mut results = Vec::with_capacity(table.len());
    for slot in table.iter() {
        if !slot.is_ready() {
            results.push(on_not_ready());
            continue;
        }

        let request_id = Uuid::new_v4().to_string();
        let rx = registry.put(request_id.clone());
        let body = make_body(&request_id);

        if slot.send(message_type, body).await.is_err() {
            registry.delete(&request_id);
            results.push(on_timeout());
            continue;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(mut value)) => {
                // The correlation ID is an internal per-slot request key; a
                // caller only ever sees `{res}`/`{error}`.
                value.clear_id();
                results.push(value);
            }
            _ => {
                registry.delete(&request_id);
                results.push(on_timeout());
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cluster::{SlotState, SlotTable};
    use crate::core::protocol::EvalRes;

    #[tokio::test]
    async fn not_ready_slots_produce_synthetic_errors_without_sending() {
        let table = SlotTable::new(4, 2).unwrap();
        let registry: CorrelationRegistry<EvalRes> = CorrelationRegistry::new();

        let results = scatter(
            &table,
            &registry,
            MessageType::Eval,
            Duration::from_millis(50),
            |id| crate::core::protocol::EvalRequest {
                id: id.to_string(),
                code: "1+1".to_string(),
                timeout: -1,
            },
            || EvalRes::error(TIMED_OUT_ERROR),
            || EvalRes::error(NOT_READY_ERROR),
        )
        .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.error.as_deref() == Some(NOT_READY_ERROR)));
    }

    #[tokio::test]
    async fn a_ready_slot_with_no_connection_times_out() {
        let table = SlotTable::new(4, 2).unwrap();
        table.get(0).unwrap().set_state(SlotState::Ready);
        let registry: CorrelationRegistry<EvalRes> = CorrelationRegistry::new();

        let results = scatter(
            &table,
            &registry,
            MessageType::Eval,
            Duration::from_millis(20),
            |id| crate::core::protocol::EvalRequest {
                id: id.to_string(),
                code: "1+1".to_string(),
                timeout: -1,
            },
            || EvalRes::error(TIMED_OUT_ERROR),
            || EvalRes::error(NOT_READY_ERROR),
        )
        .await;

        assert_eq!(results[0].error.as_deref(), Some(TIMED_OUT_ERROR));
        assert_eq!(results[1].error.as_deref(), Some(NOT_READY_ERROR));
    }

    #[tokio::test]
    async fn results_preserve_slot_id_order() {
        let table = SlotTable::new(8, 4).unwrap();
        let registry: CorrelationRegistry<EvalRes> = CorrelationRegistry::new();

        let results = scatter(
            &table,
            &registry,
            MessageType::Eval,
            Duration::from_millis(10),
            |id| crate::core::protocol::EvalRequest {
                id: id.to_string(),
                code: String::new(),
                timeout: -1,
            },
            || EvalRes::error(TIMED_OUT_ERROR),
            || EvalRes::error(NOT_READY_ERROR),
        )
        .await;

        assert_eq!(results.len(), 4);
    }
}
