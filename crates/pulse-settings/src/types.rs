//! Settings types.
//!
//! Every struct deserializes with `#[serde(default)]` so a partial user file
//! only needs the keys it overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings for the chat client.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PulseSettings {
    /// REST API settings.
    pub api: ApiSettings,
    /// Realtime (STOMP over WebSocket) settings.
    pub realtime: RealtimeSettings,
    /// Session storage settings.
    pub session: SessionSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// REST API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL every REST path is joined to.
    pub base_url: String,
    /// Path of the token refresh endpoint, relative to `base_url`.
    pub refresh_path: String,
    /// Upper bound on a single refresh round trip, in milliseconds.
    pub refresh_timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            refresh_path: "/auth/refresh-token".to_string(),
            refresh_timeout_ms: 15_000,
        }
    }
}

impl ApiSettings {
    /// Full URL of the refresh endpoint.
    pub fn refresh_url(&self) -> String {
        join_url(&self.base_url, &self.refresh_path)
    }

    /// Refresh timeout as a [`Duration`].
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }
}

/// Realtime connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// WebSocket endpoint of the STOMP broker.
    pub url: String,
    /// Heartbeat the client expects from the broker, in milliseconds (0 = none).
    pub heartbeat_incoming_ms: u64,
    /// Heartbeat the client sends to the broker, in milliseconds (0 = none).
    pub heartbeat_outgoing_ms: u64,
    /// Fixed delay before a reconnect attempt, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Bound on transport open plus STOMP handshake, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Application destination chat messages are published to.
    pub send_destination: String,
    /// Prefix of room topics; the room ID is appended.
    pub topic_prefix: String,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws".to_string(),
            heartbeat_incoming_ms: 4_000,
            heartbeat_outgoing_ms: 4_000,
            reconnect_delay_ms: 5_000,
            connect_timeout_ms: 10_000,
            send_destination: "/app/chat.send".to_string(),
            topic_prefix: "/topic/rooms/".to_string(),
        }
    }
}

impl RealtimeSettings {
    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Session persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Directory holding the durable session file. Defaults to `~/.pulse`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Key under which session changes are broadcast.
    pub key: String,
    /// Watch the durable session file for changes made by other processes.
    pub watch_file: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            key: "pulse.auth.session".to_string(),
            watch_file: true,
        }
    }
}

impl SessionSettings {
    /// Resolved data directory.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(crate::loader::pulse_home)
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
