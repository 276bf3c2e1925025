//! Realtime error types.

use std::time::Duration;

/// Errors surfaced by the realtime connection.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    /// The operation needs an established connection.
    #[error("realtime connection is not established")]
    NotConnected,

    /// The underlying transport failed or closed unexpectedly.
    #[error("transport error: {0}")]
    Transport(String),

    /// The broker sent something the client did not expect.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The broker sent an `ERROR` frame.
    #[error("broker error: {0}")]
    Broker(String),

    /// Nothing arrived from the broker within the heartbeat window.
    #[error("no data from broker for {0:?}")]
    HeartbeatTimeout(Duration),

    /// Transport open and handshake did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A frame could not be decoded.
    #[error("malformed frame: {0}")]
    Frame(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
