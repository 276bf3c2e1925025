//! In-process transport.
//!
//! [`pair`] returns a connector and a listener. Each `connect` hands the
//! listener a [`MemoryPeer`] holding the far ends of the link, which a test
//! (or an embedded broker) drives directly.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Connector, LINK_CAPACITY, TransportEvent, TransportLink};
use crate::errors::RealtimeError;
use crate::stomp::{self, Decoded, Frame};

/// Connector half of an in-memory transport.
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

/// Listener half of an in-memory transport.
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Broker side of one in-memory link.
#[derive(Debug)]
pub struct MemoryPeer {
    /// URL the client dialed.
    pub url: String,
    from_client: mpsc::Receiver<String>,
    to_client: mpsc::Sender<TransportEvent>,
}

/// Create a connected connector/listener pair.
pub fn pair() -> (MemoryConnector, MemoryListener) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    (MemoryConnector { accept_tx }, MemoryListener { accept_rx })
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink, RealtimeError> {
        let (out_tx, out_rx) = mpsc::channel(LINK_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(LINK_CAPACITY);
        let peer = MemoryPeer {
            url: url.to_owned(),
            from_client: out_rx,
            to_client: in_tx,
        };
        self.accept_tx
            .send(peer)
            .map_err(|_| RealtimeError::Transport("connection refused".into()))?;
        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

impl MemoryListener {
    /// Wait for the next client connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Take a pending connection without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.try_recv().ok()
    }
}

impl MemoryPeer {
    /// Next raw text message from the client, `None` once it hung up.
    pub async fn recv_text(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next frame from the client, skipping heartbeats.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        loop {
            let text = self.recv_text().await?;
            let decoded = stomp::decode(&text).ok()?;
            if let Some(frame) = decoded.into_iter().find_map(|d| match d {
                Decoded::Frame(f) => Some(f),
                Decoded::Heartbeat => None,
            }) {
                return Some(frame);
            }
        }
    }

    /// Send raw text to the client. Returns `false` if the client is gone.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client
            .send(TransportEvent::Text(text.into()))
            .await
            .is_ok()
    }

    /// Send a frame to the client.
    pub async fn send_frame(&self, frame: &Frame) -> bool {
        self.send_text(frame.encode()).await
    }

    /// Close the link cleanly.
    pub async fn close(self) {
        let _ = self.to_client.send(TransportEvent::Closed).await;
    }

    /// Fail the link.
    pub async fn fail(self, reason: impl Into<String>) {
        let _ = self.to_client.send(TransportEvent::Error(reason.into())).await;
    }
}
