//! Session change notifications.
//!
//! Every mutation of the store is published as a [`SessionChange`] keyed by
//! the session key, carrying the serialized session or `None` on deletion.
//! [`SessionBroadcast`] hides the delivery mechanism; [`ChannelBroadcast`]
//! fans out in-process over `tokio::sync::broadcast`.

use pulse_core::AuthUser;
use tokio::sync::broadcast;

/// Default channel capacity. Slow receivers observe `Lagged` and should
/// re-read the store.
const DEFAULT_CAPACITY: usize = 64;

/// Where a change came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written through this store instance.
    Local,
    /// Observed from another context sharing the durable storage.
    External,
}

/// A session mutation notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionChange {
    /// Session key the change applies to.
    pub key: String,
    /// Serialized session after the change; `None` means the session was removed.
    pub new_value: Option<String>,
    /// Where the change came from.
    pub origin: ChangeOrigin,
}

impl SessionChange {
    /// Decode the new session, if any.
    pub fn session(&self) -> Option<AuthUser> {
        let raw = self.new_value.as_deref()?;
        match serde_json::from_str(raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(key = %self.key, "undecodable session change: {e}");
                None
            }
        }
    }

    /// Whether the change signals a logout.
    pub fn is_removal(&self) -> bool {
        self.new_value.is_none()
    }
}

/// Publish/subscribe channel for session changes.
pub trait SessionBroadcast: Send + Sync {
    /// Publish a change to all subscribers. Never blocks.
    fn publish(&self, change: SessionChange);

    /// Subscribe to future changes.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;
}

/// In-process broadcast over `tokio::sync::broadcast`.
pub struct ChannelBroadcast {
    tx: broadcast::Sender<SessionChange>,
}

impl ChannelBroadcast {
    /// Create a channel with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel with an explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChannelBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBroadcast for ChannelBroadcast {
    fn publish(&self, change: SessionChange) {
        // No subscribers is fine: nobody is listening yet.
        let _ = self.tx.send(change);
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.tx.subscribe()
    }
}
