//! Connection lifecycle states.

use std::fmt;

/// Lifecycle of the realtime connection.
///
/// `Disconnected → Connecting → Connected`; on transport failure
/// `Connected → Error → Disconnected`, then `Connecting` again after the
/// reconnect delay unless the caller disconnected explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport opening or STOMP handshake in progress.
    Connecting,
    /// Handshake complete; frames may be sent.
    Connected,
    /// The transport failed; about to become `Disconnected`.
    Error,
}

impl ConnectionState {
    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
