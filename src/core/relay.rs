// src/core/relay.rs

//! The `/relay` broadcast bus: a many-to-many websocket fanout independent
//! of the cluster slot table. Mirrors `pkg/relay.go`'s `RelayHandler`.

use axum::extract::ws::Message;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

const DISPATCH: u8 = 0;
const RECEIVE: u8 = 1;

#[derive(Default)]
pub struct RelayBus {
    clients: DashMap<Uuid, mpsc::UnboundedSender<Message>>,
}

impl RelayBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new relay client and returns its ID plus a receiver for
    /// frames addressed to it.
    pub fn join(&self) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.insert(id, tx);
        (id, rx)
    }

    pub fn leave(&self, id: Uuid) {
        self.clients.remove(&id);
    }

    /// Fans `body` out to every registered client (including the sender,
    /// matching the original's unconditional loop over `rh.clients`) as a
    /// type-1 "receive" frame.
    pub fn dispatch(&self, body: Option<Value>) {
        let packet = crate::core::protocol::Packet {
            ty: RECEIVE,
            body,
        };
        let Ok(text) = serde_json::to_string(&packet) else {
            return;
        };
        for entry in self.clients.iter() {
            let _ = entry.value().send(Message::Text(text.clone().into()));
        }
    }

    /// Routes one inbound packet. Only `type = 0` ("dispatch") triggers a
    /// fanout; every other type is dropped, matching the original's switch
    /// on `packet.Type == 0`.
    pub fn handle_inbound(&self, packet: crate::core::protocol::Packet) {
        if packet.ty == DISPATCH {
            self.dispatch(packet.body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_reaches_every_joined_client_including_the_sender() {
        let bus = RelayBus::new();
        let (id_a, mut rx_a) = bus.join();
        let (_id_b, mut rx_b) = bus.join();

        bus.handle_inbound(crate::core::protocol::Packet {
            ty: DISPATCH,
            body: Some(serde_json::json!({"hello": "world"})),
        });

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
        bus.leave(id_a);
    }

    #[tokio::test]
    async fn a_non_dispatch_packet_is_dropped() {
        let bus = RelayBus::new();
        let (_id, mut rx) = bus.join();
        bus.handle_inbound(crate::core::protocol::Packet {
            ty: RECEIVE,
            body: None,
        });
        tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv())
            .await
            .expect_err("no frame should have been delivered");
    }

    #[tokio::test]
    async fn a_left_client_no_longer_receives_dispatches() {
        let bus = RelayBus::new();
        let (id, mut rx) = bus.join();
        bus.leave(id);
        bus.handle_inbound(crate::core::protocol::Packet {
            ty: DISPATCH,
            body: None,
        });
        tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv())
            .await
            .expect_err("no frame should have been delivered to a departed client");
    }
}
