use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Identity, MessageId, MessageKind, RoomId, UserId};

// -- Auth --

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Identity,
}

// -- Rooms --

#[derive(Debug, Serialize)]
pub struct CreateRoomRequest<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
}

// -- Messages --

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub content: &'a str,
    pub message_type: MessageKind,
}

/// A message as the server stores and pushes it. `content` is raw text for
/// `text` messages and a JSON-encoded file descriptor for `file` messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub content: String,
    pub message_type: String,
    pub created_at: DateTime<Utc>,
}

// -- Errors --

/// Body of every non-success response.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
