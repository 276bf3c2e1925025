//! Transport abstraction under the STOMP connection.
//!
//! A [`Connector`] opens a [`TransportLink`]: a bounded outbound text
//! channel plus an inbound event stream. The connection loop only ever talks
//! to the link, so the WebSocket transport and the in-memory one used by tests
//! are interchangeable.

pub mod memory;
pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::RealtimeError;

pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use ws::WsConnector;

/// Capacity of each link direction.
pub const LINK_CAPACITY: usize = 256;

/// Something that happened on the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text message arrived.
    Text(String),
    /// The peer closed the transport cleanly.
    Closed,
    /// The transport failed.
    Error(String),
}

/// An open transport.
#[derive(Debug)]
pub struct TransportLink {
    /// Outbound text messages. Dropping every sender closes the transport.
    pub outbound: mpsc::Sender<String>,
    /// Inbound events. Ends after `Closed` or `Error`.
    pub inbound: mpsc::Receiver<TransportEvent>,
}

/// Opens transports to a URL.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new transport.
    async fn connect(&self, url: &str) -> Result<TransportLink, RealtimeError>;
}
