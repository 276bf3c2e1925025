//! Chat REST endpoints.
//!
//! Everything here goes through the authenticated [`ApiClient`], so an
//! expired token is refreshed transparently. Unlike the `/auth/*` endpoints
//! these return bare JSON bodies without the `ApiResponse` envelope.

use pulse_auth::{ApiClient, AuthError};
use pulse_core::{ChatMessage, RoomId, UserId};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default page size for message history.
pub const DEFAULT_MESSAGE_PAGE_SIZE: u32 = 50;

/// Default page size for the user directory.
pub const DEFAULT_USER_PAGE_SIZE: u32 = 20;

/// A room as listed in a user's conversation list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Room ID.
    pub room_id: RoomId,
    /// Room name; for one-to-one rooms usually the other participant.
    #[serde(default)]
    pub room_name: Option<String>,
    /// Whether this is a group room.
    #[serde(default)]
    pub is_group: bool,
    /// Text of the latest message.
    #[serde(default)]
    pub last_message: Option<String>,
    /// Timestamp of the latest message.
    #[serde(default)]
    pub last_message_time: Option<String>,
    /// Messages the user has not read.
    #[serde(default)]
    pub unread_count: u32,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /chat/rooms` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Group name.
    pub name: String,
    /// Members, creator included.
    pub member_ids: Vec<UserId>,
    /// Creator.
    pub created_by: UserId,
}

/// An entry in the user directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchResult {
    /// Account ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest<'a> {
    room_id: RoomId,
    sender_id: UserId,
    message: &'a str,
}

/// Chat REST client.
#[derive(Clone)]
pub struct ChatService {
    api: ApiClient,
}

impl ChatService {
    /// Wrap an authenticated client.
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Rooms the user takes part in.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn conversations(&self, user_id: UserId) -> Result<Vec<Conversation>, AuthError> {
        self.api
            .get_json(&format!("/chat/conversations/{user_id}"))
            .await
    }

    /// One page of a room's history.
    #[tracing::instrument(skip(self), fields(room_id = %room_id))]
    pub async fn messages(
        &self,
        room_id: RoomId,
        page: u32,
        size: u32,
    ) -> Result<Vec<ChatMessage>, AuthError> {
        self.api
            .get_json(&format!("/chat/rooms/{room_id}/messages?page={page}&size={size}"))
            .await
    }

    /// ID of the one-to-one room between two users, created on first use.
    #[tracing::instrument(skip(self), fields(user_a = %user_a, user_b = %user_b))]
    pub async fn get_or_create_one_to_one(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<RoomId, AuthError> {
        self.api
            .request_json(
                Method::POST,
                &format!("/chat/rooms/1to1?userA={user_a}&userB={user_b}"),
                None,
            )
            .await
    }

    /// Create a group room and return its ID.
    #[tracing::instrument(skip_all, fields(name = %request.name))]
    pub async fn create_group_room(&self, request: &CreateRoomRequest) -> Result<RoomId, AuthError> {
        self.api.post_json("/chat/rooms", request).await
    }

    /// Send a message over REST, for when the realtime connection is down.
    #[tracing::instrument(skip(self, message), fields(room_id = %room_id))]
    pub async fn send_message_rest(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        message: &str,
    ) -> Result<ChatMessage, AuthError> {
        let body = SendMessageRequest {
            room_id,
            sender_id,
            message,
        };
        self.api.post_json("/chat/messages", &body).await
    }

    /// One page of the user directory.
    #[tracing::instrument(skip(self))]
    pub async fn users(&self, page: u32, size: u32) -> Result<Vec<UserSearchResult>, AuthError> {
        self.api
            .get_json(&format!("/chat/users?page={page}&size={size}"))
            .await
    }

    /// Mark every message in the room as read by the user.
    #[tracing::instrument(skip(self), fields(room_id = %room_id, user_id = %user_id))]
    pub async fn mark_read(&self, room_id: RoomId, user_id: UserId) -> Result<(), AuthError> {
        let _ = self
            .api
            .request(
                Method::POST,
                &format!("/chat/rooms/{room_id}/read?userId={user_id}"),
                None,
            )
            .await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
