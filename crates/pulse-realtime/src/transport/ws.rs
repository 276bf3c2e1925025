//! WebSocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{Connector, LINK_CAPACITY, TransportEvent, TransportLink};
use crate::errors::RealtimeError;

/// Connector that dials `ws://` and `wss://` URLs.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    #[tracing::instrument(skip_all, fields(url = %url))]
    async fn connect(&self, url: &str) -> Result<TransportLink, RealtimeError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| RealtimeError::Transport(e.to_string()))?;
        info!(url, "websocket opened");

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(LINK_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<TransportEvent>(LINK_CAPACITY);

        // Writer: forwards outbound text until every sender is dropped, then
        // closes the socket.
        let _writer = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    debug!("websocket write failed: {e}");
                    return;
                }
            }
            let _ = ws_tx.close().await;
            debug!("websocket writer closed");
        });

        // Reader: maps socket messages to transport events.
        let _reader = tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => TransportEvent::Text(text.as_str().to_owned()),
                    Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                        Ok(s) => TransportEvent::Text(s.to_owned()),
                        Err(_) => {
                            warn!(len = data.len(), "dropping non-UTF8 binary message");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => {
                        let _ = in_tx.send(TransportEvent::Closed).await;
                        return;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                    Err(e) => {
                        let _ = in_tx.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                };
                if in_tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = in_tx.send(TransportEvent::Closed).await;
        });

        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
