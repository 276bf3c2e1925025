//! Room subscriptions.
//!
//! At most one subscription per room. Each gets a fresh transport id
//! (`sub-N`, never reused for the manager's lifetime); inbound `MESSAGE`
//! frames are routed by their `subscription` header, so frames for a replaced
//! or cancelled subscription find nothing and are dropped.
//!
//! Callbacks run while the registry is read-locked, so a callback that is
//! running holds off `disconnect`, unsubscribe and replacement until it
//! returns. A callback must not call back into the manager's subscription
//! methods or `disconnect`; hand the work to a task instead.

use std::collections::HashMap;
use std::sync::Arc;

use pulse_core::{ChatMessage, RoomId};
use tracing::{debug, error, info, trace, warn};

use crate::errors::RealtimeError;
use crate::manager::{ConnectionManager, Inner, send_on};
use crate::stomp::{Command, Frame};

/// Receives messages for one room.
pub type MessageCallback = Arc<dyn Fn(ChatMessage) + Send + Sync>;

struct Subscription {
    id: String,
    destination: String,
    callback: MessageCallback,
}

/// Room → subscription table plus the reverse id index.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    by_room: HashMap<RoomId, Subscription>,
    by_id: HashMap<String, RoomId>,
    next_id: u64,
}

impl SubscriptionRegistry {
    /// Register a subscription for `room`, replacing any existing one.
    ///
    /// Returns the new id and the id it replaced.
    pub(crate) fn insert(
        &mut self,
        room: RoomId,
        destination: String,
        callback: MessageCallback,
    ) -> (String, Option<String>) {
        let previous = self.remove(room);
        self.next_id += 1;
        let id = format!("sub-{}", self.next_id);
        let _ = self.by_id.insert(id.clone(), room);
        let _ = self.by_room.insert(
            room,
            Subscription {
                id: id.clone(),
                destination,
                callback,
            },
        );
        (id, previous)
    }

    /// Drop the subscription for `room`, returning its id.
    pub(crate) fn remove(&mut self, room: RoomId) -> Option<String> {
        let sub = self.by_room.remove(&room)?;
        let _ = self.by_id.remove(&sub.id);
        Some(sub.id)
    }

    /// Drop the subscription with `id` if it still belongs to `room`.
    fn remove_if_current(&mut self, room: RoomId, id: &str) {
        if self.by_room.get(&room).is_some_and(|s| s.id == id) {
            let _ = self.remove(room);
        }
    }

    /// Room and callback for a live subscription id.
    pub(crate) fn lookup(&self, id: &str) -> Option<(RoomId, &MessageCallback)> {
        let room = *self.by_id.get(id)?;
        let sub = self.by_room.get(&room)?;
        Some((room, &sub.callback))
    }

    /// Drop everything. Returns how many subscriptions were removed.
    pub(crate) fn clear(&mut self) -> usize {
        let n = self.by_room.len();
        self.by_room.clear();
        self.by_id.clear();
        n
    }

    pub(crate) fn contains(&self, room: RoomId) -> bool {
        self.by_room.contains_key(&room)
    }

    pub(crate) fn destination(&self, room: RoomId) -> Option<&str> {
        self.by_room.get(&room).map(|s| s.destination.as_str())
    }

    pub(crate) fn rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self.by_room.keys().copied().collect();
        rooms.sort_unstable();
        rooms
    }
}

impl ConnectionManager {
    /// Subscribe to a room's topic.
    ///
    /// Requires an established connection. An existing subscription for the
    /// room is cancelled first; the last caller's callback wins.
    pub fn subscribe_to_room<F>(&self, room_id: RoomId, callback: F) -> Result<(), RealtimeError>
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        let destination = format!("{}{}", self.inner.settings.topic_prefix, room_id);
        let callback: MessageCallback = Arc::new(callback);
        let registered = self.with_connected(|tx| {
            let (sub_id, previous) =
                self.inner
                    .registry
                    .write()
                    .insert(room_id, destination.clone(), callback);
            (tx.clone(), sub_id, previous)
        });
        let Some((tx, sub_id, previous)) = registered else {
            error!(room_id = %room_id, "cannot subscribe, realtime not connected");
            return Err(RealtimeError::NotConnected);
        };

        if let Some(old) = &previous {
            let _ = send_on(&tx, &Frame::new(Command::Unsubscribe).header("id", old.as_str()));
            debug!(room_id = %room_id, sub_id = %old, "replaced existing subscription");
        }
        let subscribe = Frame::new(Command::Subscribe)
            .header("id", sub_id.as_str())
            .header("destination", destination.as_str());
        if let Err(e) = send_on(&tx, &subscribe) {
            self.inner
                .registry
                .write()
                .remove_if_current(room_id, &sub_id);
            return Err(e);
        }

        info!(
            room_id = %room_id,
            sub_id = %sub_id,
            destination = %destination,
            "subscribed to room"
        );
        Ok(())
    }

    /// Cancel the room's subscription. No-op when there is none.
    pub fn unsubscribe_from_room(&self, room_id: RoomId) {
        let Some(sub_id) = self.inner.registry.write().remove(room_id) else {
            return;
        };
        let frame = Frame::new(Command::Unsubscribe).header("id", sub_id.as_str());
        if let Err(e) = self.send_frame(&frame) {
            debug!(room_id = %room_id, sub_id = %sub_id, error = %e, "UNSUBSCRIBE not sent");
        }
        info!(room_id = %room_id, sub_id = %sub_id, "unsubscribed from room");
    }

    /// Whether a subscription exists for the room.
    pub fn is_subscribed(&self, room_id: RoomId) -> bool {
        self.inner.registry.read().contains(room_id)
    }

    /// Topic the room is subscribed on, if any.
    pub fn subscription_destination(&self, room_id: RoomId) -> Option<String> {
        self.inner
            .registry
            .read()
            .destination(room_id)
            .map(String::from)
    }

    /// Rooms with a live subscription, ascending.
    pub fn subscribed_rooms(&self) -> Vec<RoomId> {
        self.inner.registry.read().rooms()
    }
}

impl Inner {
    /// Deliver a `MESSAGE` frame to its subscription's callback.
    ///
    /// The body is parsed first; the lookup and the call happen under one
    /// read guard.
    pub(crate) fn route_message(&self, frame: &Frame) {
        let Some(sub_id) = frame.get("subscription") else {
            warn!("MESSAGE frame without subscription header");
            return;
        };
        let message = match serde_json::from_str::<ChatMessage>(&frame.body) {
            Ok(message) => message,
            Err(e) => {
                warn!(sub_id, error = %e, "failed to parse chat message");
                return;
            }
        };
        let registry = self.registry.read();
        let Some((room_id, callback)) = registry.lookup(sub_id) else {
            debug!(sub_id, "dropping frame for stale subscription");
            return;
        };
        trace!(room_id = %room_id, sub_id, "delivering chat message");
        callback(message);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
