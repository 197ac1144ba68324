// src/core/correlation.rs

//! Correlation registry: matches an outstanding request ID against the
//! single reply a slot eventually sends back over the duplex connection.
//!
//! The original Go server used one unbuffered `chan EvalRes` (or
//! `chan EntityResponse`) per in-flight request, registered in a map and
//! read by exactly one goroutine. A `tokio::sync::oneshot` channel is the
//! direct Rust counterpart: single value, single consumer, dropped cleanly
//! if nobody ever receives it.

use dashmap::DashMap;
use tokio::sync::oneshot;

/// A registry of in-flight requests of one reply type `T`, keyed by request
/// ID. Used twice over: once for `Eval`/`BroadcastEval` replies, once for
/// `Entity` replies.
pub struct CorrelationRegistry<T> {
    inflight: DashMap<String, oneshot::Sender<T>>,
}

impl<T> Default for CorrelationRegistry<T> {
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }
}

impl<T> CorrelationRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` and returns the receiving half. Overwrites (and so
    /// silently drops) any previous registration under the same ID — callers
    /// are expected to generate unique IDs per request.
    pub fn put(&self, id: impl Into<String>) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.inflight.insert(id.into(), tx);
        rx
    }

    /// Delivers `value` to the waiter registered under `id`, if any. Returns
    /// `true` if a waiter was found and the delivery was attempted.
    pub fn deliver(&self, id: &str, value: T) -> bool {
        match self.inflight.remove(id) {
            Some((_, tx)) => {
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    /// Removes the registration for `id` without delivering anything, used
    /// once a request's timeout has fired so a late reply finds nothing to
    /// correlate against.
    pub fn delete(&self, id: &str) {
        self.inflight.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_deliver_wakes_the_waiter() {
        let registry: CorrelationRegistry<i32> = CorrelationRegistry::new();
        let rx = registry.put("req-1");
        assert!(registry.deliver("req-1", 42));
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[test]
    fn delivering_an_unknown_id_is_a_no_op() {
        let registry: CorrelationRegistry<i32> = CorrelationRegistry::new();
        assert!(!registry.deliver("missing", 1));
    }

    #[tokio::test]
    async fn delete_prevents_a_late_delivery_from_finding_a_waiter() {
        let registry: CorrelationRegistry<i32> = CorrelationRegistry::new();
        let _rx = registry.put("req-1");
        registry.delete("req-1");
        assert!(!registry.deliver("req-1", 1));
    }

    #[tokio::test]
    async fn isolation_between_distinct_ids() {
        let registry: CorrelationRegistry<i32> = CorrelationRegistry::new();
        let rx_a = registry.put("a");
        let rx_b = registry.put("b");
        registry.deliver("a", 1);
        registry.deliver("b", 2);
        assert_eq!(rx_a.await.unwrap(), 1);
        assert_eq!(rx_b.await.unwrap(), 2);
    }
}
