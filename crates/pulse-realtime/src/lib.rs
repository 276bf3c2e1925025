//! # pulse-realtime
//!
//! Realtime chat over STOMP 1.2 on a WebSocket.
//!
//! - [`ConnectionManager`]: one connection with heartbeats, a watchdog on
//!   broker silence and delayed reconnect after a drop
//! - Room subscriptions: [`ConnectionManager::subscribe_to_room`] keeps one
//!   subscription per room and routes inbound messages to its callback
//! - [`ConnectionManager::send_message`]: publishes to the chat destination
//! - [`stomp`]: frame codec and heartbeat negotiation
//! - [`transport`]: the [`Connector`] seam with WebSocket and in-memory links

#![deny(unsafe_code)]

pub mod dispatch;
pub mod errors;
pub mod manager;
pub mod registry;
pub mod state;
pub mod stomp;
pub mod transport;

#[cfg(test)]
mod harness;

use std::sync::Arc;

use pulse_session::SessionStore;
use pulse_settings::RealtimeSettings;

pub use errors::RealtimeError;
pub use manager::{ConnectedCallback, ConnectionManager, ErrorCallback};
pub use registry::MessageCallback;
pub use state::ConnectionState;
pub use transport::{
    Connector, MemoryConnector, MemoryListener, MemoryPeer, TransportEvent, TransportLink,
    WsConnector,
};

/// Build a WebSocket-backed manager that authenticates with the session's
/// access token.
pub fn from_settings(settings: RealtimeSettings, session: Arc<SessionStore>) -> ConnectionManager {
    ConnectionManager::new(settings, Arc::new(WsConnector::new())).with_session(session)
}
