use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Server-assigned message id, unique within a room.
    MessageId
);
opaque_id!(RoomId);
opaque_id!(UserId);

/// The signed-in user as reported by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Result of a file upload. Also the JSON payload stored as the content of
/// a `file` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub url: String,
    pub filename: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    File,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    File(FileDescriptor),
}

/// A chat message after decoding. Only constructed from frames whose kind and
/// content were understood; see [`crate::events::decode_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub author_id: UserId,
    pub author_name: Option<String>,
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self.body {
            MessageBody::Text(_) => MessageKind::Text,
            MessageBody::File(_) => MessageKind::File,
        }
    }

    /// Timeline sort key: creation time, then id.
    pub fn order_key(&self) -> (DateTime<Utc>, &MessageId) {
        (self.created_at, &self.id)
    }

    /// Single-line rendering used by text front ends.
    pub fn preview(&self) -> String {
        match &self.body {
            MessageBody::Text(text) => text.clone(),
            MessageBody::File(file) => format!(
                "{} ({})",
                file.filename,
                crate::format::format_file_size(file.size_bytes)
            ),
        }
    }
}
