//! Outbound chat messages.

use pulse_core::{RoomId, UserId};
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::RealtimeError;
use crate::manager::{ConnectionManager, send_on};
use crate::stomp::{Command, Frame};

/// Body of a `SEND` to the chat destination.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundMessage<'a> {
    room_id: RoomId,
    sender_id: UserId,
    message: &'a str,
}

impl ConnectionManager {
    /// Publish a chat message.
    ///
    /// Fire-and-forget: the message reaches subscribers (the sender included)
    /// through the room topic. Fails with [`RealtimeError::NotConnected`]
    /// when there is no live connection; nothing is queued.
    pub fn send_message(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        content: &str,
    ) -> Result<(), RealtimeError> {
        let Some(tx) = self.connected_link() else {
            error!(room_id = %room_id, "cannot send message, realtime not connected");
            return Err(RealtimeError::NotConnected);
        };

        let body = serde_json::to_string(&OutboundMessage {
            room_id,
            sender_id,
            message: content,
        })
        .map_err(|e| RealtimeError::Frame(e.to_string()))?;
        let frame = Frame::new(Command::Send)
            .header("destination", self.inner.settings.send_destination.as_str())
            .header("content-type", "application/json")
            .body(body);

        send_on(&tx, &frame)?;
        debug!(room_id = %room_id, sender_id = %sender_id, "message sent");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{Broker, room, settings, user};
    use serde_json::{Value, json};

    #[tokio::test]
    async fn send_requires_connection() {
        let broker = Broker::new();
        let manager = broker.manager(settings());
        assert_eq!(
            manager.send_message(room(5), user(1), "hi"),
            Err(RealtimeError::NotConnected)
        );
    }

    #[tokio::test]
    async fn send_publishes_json_to_chat_destination() {
        let mut broker = Broker::new();
        let manager = broker.manager(settings());
        manager.connect(None, None);
        let (mut peer, _) = broker.accept_and_handshake(&manager).await;

        manager.send_message(room(5), user(1), "hi \"there\"").unwrap();
        let frame = peer.recv_frame().await.unwrap();
        assert_eq!(frame.command, Command::Send);
        assert_eq!(frame.get("destination"), Some("/app/chat.send"));
        assert_eq!(frame.get("content-type"), Some("application/json"));
        let body: Value = serde_json::from_str(&frame.body).unwrap();
        assert_eq!(
            body,
            json!({"roomId": 5, "senderId": 1, "message": "hi \"there\""})
        );
        manager.disconnect();
    }

    #[tokio::test]
    async fn send_uses_configured_destination() {
        let mut broker = Broker::new();
        let mut s = settings();
        s.send_destination = "/app/custom.send".into();
        let manager = broker.manager(s);
        manager.connect(None, None);
        let (mut peer, _) = broker.accept_and_handshake(&manager).await;

        manager.send_message(room(7), user(3), "yo").unwrap();
        let frame = peer.recv_frame().await.unwrap();
        assert_eq!(frame.get("destination"), Some("/app/custom.send"));
        manager.disconnect();
    }

    #[tokio::test]
    async fn send_after_disconnect_is_rejected() {
        let mut broker = Broker::new();
        let manager = broker.manager(settings());
        manager.connect(None, None);
        let (_peer, _) = broker.accept_and_handshake(&manager).await;
        manager.disconnect();
        assert_eq!(
            manager.send_message(room(5), user(1), "late"),
            Err(RealtimeError::NotConnected)
        );
    }
}
