//! Facade error type.

use pulse_auth::AuthError;
use pulse_realtime::RealtimeError;
use pulse_session::SessionError;
use pulse_settings::SettingsError;

/// Errors surfaced by [`crate::PulseClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Loading settings failed.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Reading or writing the session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An HTTP call failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A realtime operation failed.
    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    /// The backend answered with `success: false` or no data.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ClientError {
    /// Whether the caller must sign in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Auth(e) if e.requires_reauth())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
