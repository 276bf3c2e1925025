//! Session, chat, and API envelope types.
//!
//! All wire types use camelCase JSON to match the backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{RoomId, UserId};

/// Credential material attached to a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    /// Short-lived bearer token for authenticated calls.
    pub access_token: String,
    /// Lifetime of the access token in seconds, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl AuthTokens {
    /// Tokens with no known expiry.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in: None,
        }
    }
}

/// Partial token update applied to an existing session.
///
/// Fields left as `None` keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenUpdate {
    /// Replacement access token.
    pub access_token: Option<String>,
    /// Replacement expiry in seconds.
    pub expires_in: Option<i64>,
}

impl TokenUpdate {
    /// Update carrying only a new access token.
    pub fn access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            expires_in: None,
        }
    }

    /// Set the expiry on this update.
    #[must_use]
    pub fn with_expires_in(mut self, expires_in: Option<i64>) -> Self {
        self.expires_in = expires_in;
        self
    }

    /// Apply to a token set in place.
    pub fn apply(&self, tokens: &mut AuthTokens) {
        if let Some(token) = &self.access_token {
            tokens.access_token.clone_from(token);
        }
        if self.expires_in.is_some() {
            tokens.expires_in = self.expires_in;
        }
    }
}

/// The signed-in user: identity fields plus current tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Account ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Authorization role (e.g. `USER`, `ADMIN`).
    pub role: String,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Avatar image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Current credentials.
    pub tokens: AuthTokens,
}

impl AuthUser {
    /// Current bearer token.
    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    /// Whether this user has the admin role.
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

/// A chat message as delivered on a room topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned message ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Author.
    pub sender_id: UserId,
    /// Author display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Author avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,
    /// Message text.
    pub message: String,
    /// Server timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Read receipt flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Standard REST envelope: `{ success, message, data, status }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    #[serde(default)]
    pub success: bool,
    /// Human-readable status message.
    #[serde(default)]
    pub message: String,
    /// Payload; absent on some failures.
    pub data: Option<T>,
    /// Mirrored HTTP status.
    #[serde(default)]
    pub status: u16,
}
