//! Realtime connection manager.
//!
//! Owns one STOMP session over a [`Connector`] transport. A background task
//! runs the connection loop: open, handshake, pump frames and heartbeats,
//! and on loss wait `reconnect_delay` before trying again. An explicit
//! [`ConnectionManager::disconnect`] cancels the loop; nothing reconnects
//! after it.
//!
//! Subscriptions live only as long as the transport that carried them. Any
//! drop clears the registry, and callers resubscribe once `on_connected`
//! fires again.
//!
//! Lock order is `control` then `registry`. Room callbacks run under the
//! registry read lock.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use pulse_session::SessionStore;
use pulse_settings::RealtimeSettings;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::errors::RealtimeError;
use crate::registry::SubscriptionRegistry;
use crate::state::ConnectionState;
use crate::stomp::{self, Command, Decoded, Frame, HeartBeat, Negotiated};
use crate::transport::{Connector, TransportEvent, TransportLink};

/// Invoked each time the STOMP handshake completes.
pub type ConnectedCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked when an established or pending connection fails.
pub type ErrorCallback = Arc<dyn Fn(&RealtimeError) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_connected: Option<ConnectedCallback>,
    on_error: Option<ErrorCallback>,
}

/// Loop ownership and the live outbound channel. State transitions and
/// registry resets happen under this lock so a cancelled loop can never
/// overwrite `Disconnected`.
#[derive(Default)]
struct Control {
    run: Option<CancellationToken>,
    link: Option<mpsc::Sender<String>>,
}

pub(crate) struct Inner {
    pub(crate) settings: RealtimeSettings,
    connector: Arc<dyn Connector>,
    session: Option<Arc<SessionStore>>,
    state_tx: watch::Sender<ConnectionState>,
    pub(crate) registry: RwLock<SubscriptionRegistry>,
    callbacks: Mutex<Callbacks>,
    control: Mutex<Control>,
}

/// Handle to the realtime connection. Clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    pub(crate) inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state.
    pub fn new(settings: RealtimeSettings, connector: Arc<dyn Connector>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                settings,
                connector,
                session: None,
                state_tx,
                registry: RwLock::new(SubscriptionRegistry::default()),
                callbacks: Mutex::new(Callbacks::default()),
                control: Mutex::new(Control::default()),
            }),
        }
    }

    /// Attach the session store whose access token authenticates `CONNECT`.
    ///
    /// Must be called before the manager is cloned or connected.
    #[must_use]
    pub fn with_session(mut self, session: Arc<SessionStore>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.session = Some(session);
        } else {
            warn!("session not attached, manager already shared");
        }
        self
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Whether frames may be sent.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Start connecting.
    ///
    /// When already connected, `on_connected` runs immediately and nothing
    /// else happens. When a connection loop is already running, the
    /// callbacks replace the previous ones. Must be called inside a Tokio
    /// runtime.
    pub fn connect(
        &self,
        on_connected: Option<ConnectedCallback>,
        on_error: Option<ErrorCallback>,
    ) {
        if self.is_connected() {
            debug!("realtime already connected");
            if let Some(cb) = on_connected {
                cb();
            }
            return;
        }

        {
            let mut callbacks = self.inner.callbacks.lock();
            callbacks.on_connected = on_connected;
            callbacks.on_error = on_error;
        }

        let token = {
            let mut control = self.inner.control.lock();
            if control.run.is_some() {
                debug!("realtime connection loop already running");
                return;
            }
            let token = CancellationToken::new();
            control.run = Some(token.clone());
            token
        };

        info!(url = %self.inner.settings.url, "starting realtime connection");
        let _ = tokio::spawn(Arc::clone(&self.inner).run_loop(token));
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Subscriptions are dropped before the transport is torn down. Once this
    /// returns, no room callback is running and none will start.
    pub fn disconnect(&self) {
        let (cleared, was_running, link) = {
            let mut control = self.inner.control.lock();
            let cleared = self.inner.registry.write().clear();
            let token = control.run.take();
            if let Some(token) = &token {
                token.cancel();
            }
            self.inner.set_state(ConnectionState::Disconnected);
            (cleared, token.is_some(), control.link.take())
        };
        if let Some(tx) = link {
            let _ = tx.try_send(Frame::new(Command::Disconnect).encode());
        }
        info!(subscriptions = cleared, was_running, "realtime disconnected");
    }

    /// Send a frame on the live connection.
    pub(crate) fn send_frame(&self, frame: &Frame) -> Result<(), RealtimeError> {
        let tx = self.connected_link().ok_or(RealtimeError::NotConnected)?;
        send_on(&tx, frame)
    }

    /// Outbound channel, if connected.
    pub(crate) fn connected_link(&self) -> Option<mpsc::Sender<String>> {
        self.with_connected(mpsc::Sender::clone)
    }

    /// Run `f` on the live outbound channel while holding the control lock,
    /// so no disconnect or drop can interleave. `None` if not connected.
    pub(crate) fn with_connected<T>(
        &self,
        f: impl FnOnce(&mpsc::Sender<String>) -> T,
    ) -> Option<T> {
        let control = self.inner.control.lock();
        if *self.inner.state_tx.borrow() != ConnectionState::Connected {
            return None;
        }
        control.link.as_ref().map(f)
    }
}

pub(crate) fn send_on(tx: &mpsc::Sender<String>, frame: &Frame) -> Result<(), RealtimeError> {
    tx.try_send(frame.encode()).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => {
            RealtimeError::Transport("outbound queue full".into())
        }
        mpsc::error::TrySendError::Closed(_) => RealtimeError::NotConnected,
    })
}

/// Host part of a URL, for the STOMP `host` header.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    if host_port.starts_with('[') {
        return host_port
            .split_once(']')
            .map_or(host_port, |(h, _)| h.trim_start_matches('['));
    }
    host_port.split(':').next().unwrap_or(host_port)
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(state = %state, "realtime state changed");
        }
    }

    /// Apply a state unless the loop owning `token` was cancelled.
    fn transition(&self, token: &CancellationToken, state: ConnectionState) -> bool {
        let _control = self.control.lock();
        if token.is_cancelled() {
            return false;
        }
        self.set_state(state);
        true
    }

    fn client_heartbeat(&self) -> HeartBeat {
        HeartBeat::new(
            self.settings.heartbeat_outgoing_ms,
            self.settings.heartbeat_incoming_ms,
        )
    }

    async fn run_loop(self: Arc<Self>, token: CancellationToken) {
        loop {
            if !self.transition(&token, ConnectionState::Connecting) {
                break;
            }
            let outcome = tokio::select! {
                () = token.cancelled() => break,
                outcome = self.run_connection(&token) => outcome,
            };
            if !self.handle_drop(&token, outcome) {
                break;
            }

            let delay = self.settings.reconnect_delay();
            debug!(delay_ms = self.settings.reconnect_delay_ms, "scheduling reconnect");
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        debug!("realtime connection loop stopped");
    }

    /// Clean up after a connection ends. Returns `false` if the loop should
    /// stop.
    fn handle_drop(&self, token: &CancellationToken, outcome: Result<(), RealtimeError>) -> bool {
        {
            let mut control = self.control.lock();
            if token.is_cancelled() {
                return false;
            }
            control.link = None;
            let cleared = self.registry.write().clear();
            if cleared > 0 {
                debug!(subscriptions = cleared, "dropped subscriptions with transport");
            }
            if outcome.is_err() {
                self.set_state(ConnectionState::Error);
            }
        }

        match &outcome {
            Err(e) => {
                warn!(error = %e, "realtime connection lost");
                let on_error = self.callbacks.lock().on_error.clone();
                if let Some(cb) = on_error {
                    cb(e);
                }
            }
            Ok(()) => info!("realtime connection closed by broker"),
        }

        self.transition(token, ConnectionState::Disconnected)
    }

    async fn run_connection(&self, token: &CancellationToken) -> Result<(), RealtimeError> {
        let limit = self.settings.connect_timeout();
        let (link, negotiated) = match tokio::time::timeout(limit, self.open()).await {
            Ok(result) => result?,
            Err(_) => return Err(RealtimeError::ConnectTimeout(limit)),
        };
        let TransportLink {
            outbound,
            mut inbound,
        } = link;

        {
            let mut control = self.control.lock();
            if token.is_cancelled() {
                return Ok(());
            }
            control.link = Some(outbound.clone());
            self.set_state(ConnectionState::Connected);
        }
        info!(
            url = %self.settings.url,
            outgoing = ?negotiated.outgoing,
            incoming = ?negotiated.incoming,
            "realtime connected"
        );

        let on_connected = self.callbacks.lock().on_connected.clone();
        if let Some(cb) = on_connected {
            cb();
        }

        self.pump(&outbound, &mut inbound, negotiated).await
    }

    /// Open the transport and complete the STOMP handshake.
    #[tracing::instrument(skip_all, fields(url = %self.settings.url))]
    async fn open(&self) -> Result<(TransportLink, Negotiated), RealtimeError> {
        let url = self.settings.url.as_str();
        let mut link = self.connector.connect(url).await?;

        let client = self.client_heartbeat();
        let mut connect = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("heart-beat", client.to_header())
            .header("host", host_of(url));
        if let Some(token) = self.session.as_ref().and_then(|s| s.access_token()) {
            connect = connect.header("Authorization", format!("Bearer {token}"));
        }
        link.outbound
            .send(connect.encode())
            .await
            .map_err(|_| RealtimeError::Transport("transport closed before CONNECT".into()))?;

        loop {
            let text = match link.inbound.recv().await {
                Some(TransportEvent::Text(text)) => text,
                Some(TransportEvent::Error(e)) => return Err(RealtimeError::Transport(e)),
                Some(TransportEvent::Closed) | None => {
                    return Err(RealtimeError::Transport("closed during handshake".into()));
                }
            };
            for decoded in stomp::decode(&text)? {
                let frame = match decoded {
                    Decoded::Heartbeat => continue,
                    Decoded::Frame(frame) => frame,
                };
                return match frame.command {
                    Command::Connected => {
                        let server = frame
                            .get("heart-beat")
                            .and_then(HeartBeat::parse)
                            .unwrap_or_default();
                        Ok((link, stomp::negotiate_heartbeat(client, server)))
                    }
                    Command::Error => Err(RealtimeError::Broker(frame.error_message())),
                    other => Err(RealtimeError::Protocol(format!(
                        "expected CONNECTED, got {other}"
                    ))),
                };
            }
        }
    }

    /// Move frames until the transport ends or the broker goes quiet.
    async fn pump(
        &self,
        outbound: &mpsc::Sender<String>,
        inbound: &mut mpsc::Receiver<TransportEvent>,
        negotiated: Negotiated,
    ) -> Result<(), RealtimeError> {
        let send_heartbeats = negotiated.outgoing.is_some();
        let mut ticker =
            tokio::time::interval(negotiated.outgoing.unwrap_or(Duration::from_secs(60)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let _ = ticker.tick().await;

        // Broker silence longer than twice the agreed interval means the link is dead.
        let window = negotiated.incoming.map(|d| d * 2);
        let watch_incoming = window.is_some();
        let window = window.unwrap_or_default();
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                event = inbound.recv() => match event {
                    Some(TransportEvent::Text(text)) => {
                        last_seen = Instant::now();
                        self.handle_text(&text)?;
                    }
                    Some(TransportEvent::Error(e)) => return Err(RealtimeError::Transport(e)),
                    Some(TransportEvent::Closed) | None => return Ok(()),
                },
                _ = ticker.tick(), if send_heartbeats => {
                    if outbound.send(stomp::HEARTBEAT.into()).await.is_err() {
                        return Err(RealtimeError::Transport("outbound channel closed".into()));
                    }
                    trace!("heartbeat sent");
                }
                () = tokio::time::sleep_until(last_seen + window), if watch_incoming => {
                    return Err(RealtimeError::HeartbeatTimeout(window));
                }
            }
        }
    }

    fn handle_text(&self, text: &str) -> Result<(), RealtimeError> {
        let (decoded, malformed) = stomp::decode_prefix(text);
        for item in decoded {
            let frame = match item {
                Decoded::Heartbeat => {
                    trace!("heartbeat received");
                    continue;
                }
                Decoded::Frame(frame) => frame,
            };
            match frame.command {
                Command::Message => self.route_message(&frame),
                Command::Error => return Err(RealtimeError::Broker(frame.error_message())),
                Command::Receipt => debug!(receipt = frame.get("receipt-id"), "receipt received"),
                other => debug!(command = %other, "ignoring unexpected frame"),
            }
        }
        if let Some(e) = malformed {
            warn!(error = %e, "dropping malformed frame");
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
