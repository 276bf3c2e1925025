//! Auth error types.

use std::time::Duration;

/// Why a token refresh failed.
///
/// `Clone` so every caller joined on one refresh receives the same value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// The refresh endpoint answered with a non-success status.
    #[error("refresh rejected ({status}): {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or server message.
        message: String,
    },

    /// The request never produced a response.
    #[error("refresh transport error: {0}")]
    Transport(String),

    /// The response did not carry a usable access token.
    #[error("invalid refresh response: {0}")]
    InvalidPayload(String),

    /// No response within the configured bound.
    #[error("refresh timed out after {0:?}")]
    TimedOut(Duration),
}

/// Errors returned by authenticated and public API calls.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success status other than an unrecoverable 401.
    #[error("request failed ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or server message.
        message: String,
    },

    /// Still unauthorized after refreshing and retrying once.
    #[error("unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Response body or server message.
        message: String,
    },

    /// The token refresh triggered by a 401 failed.
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

impl AuthError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. }
            | Self::Unauthorized { status, .. }
            | Self::Refresh(RefreshError::Http { status, .. }) => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the caller must sign in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::Refresh(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
