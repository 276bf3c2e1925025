//! Test fixtures: an in-memory broker driving a [`ConnectionManager`].

use std::sync::Arc;

use pulse_core::{ChatMessage, RoomId, UserId};
use pulse_settings::RealtimeSettings;
use tokio::sync::mpsc;

use crate::manager::ConnectionManager;
use crate::state::ConnectionState;
use crate::stomp::{Command, Frame};
use crate::transport::memory::{self, MemoryConnector, MemoryListener, MemoryPeer};

/// Settings with heartbeats off so only the reconnect and connect timers run.
pub(crate) fn settings() -> RealtimeSettings {
    RealtimeSettings {
        url: "memory://broker/ws".into(),
        heartbeat_incoming_ms: 0,
        heartbeat_outgoing_ms: 0,
        ..RealtimeSettings::default()
    }
}

pub(crate) struct Broker {
    pub(crate) connector: MemoryConnector,
    pub(crate) listener: MemoryListener,
}

impl Broker {
    pub(crate) fn new() -> Self {
        let (connector, listener) = memory::pair();
        Self {
            connector,
            listener,
        }
    }

    pub(crate) fn manager(&self, settings: RealtimeSettings) -> ConnectionManager {
        ConnectionManager::new(settings, Arc::new(self.connector.clone()))
    }

    /// Accept the next connection, answer `CONNECT`, and wait for the manager
    /// to report `Connected`. Returns the peer and the `CONNECT` frame.
    pub(crate) async fn accept_and_handshake(
        &mut self,
        manager: &ConnectionManager,
    ) -> (MemoryPeer, Frame) {
        let mut peer = self.listener.accept().await.unwrap();
        let connect = peer.recv_frame().await.unwrap();
        assert!(
            peer.send_frame(
                &Frame::new(Command::Connected)
                    .header("version", "1.2")
                    .header("heart-beat", "0,0"),
            )
            .await
        );
        let _ = manager
            .watch_state()
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        (peer, connect)
    }
}

/// A `MESSAGE` frame for `sub_id` carrying a chat message.
pub(crate) fn message_frame(sub_id: &str, room: i64, text: &str) -> Frame {
    let body = serde_json::json!({
        "id": 1,
        "roomId": room,
        "senderId": 2,
        "message": text,
    });
    Frame::new(Command::Message)
        .header("subscription", sub_id)
        .header("destination", format!("/topic/rooms/{room}"))
        .header("message-id", "m-1")
        .body(body.to_string())
}

/// Callback that forwards every delivered message into a channel.
pub(crate) fn collector() -> (
    impl Fn(ChatMessage) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<ChatMessage>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |msg| {
            let _ = tx.send(msg);
        },
        rx,
    )
}

pub(crate) fn room(id: i64) -> RoomId {
    RoomId::new(id)
}

pub(crate) fn user(id: i64) -> UserId {
    UserId::new(id)
}
