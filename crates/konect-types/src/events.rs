use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::StoredMessage;
use crate::models::{FileDescriptor, Message, MessageBody, RoomId};

/// Commands sent FROM client TO server over the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Scope subsequent pushes to this room. Sent once the channel is open.
    JoinRoom { room_id: RoomId },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not a message: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("unknown message kind '{0}'")]
    UnknownKind(String),

    #[error("malformed file descriptor on message {id}: {source}")]
    FileDescriptor {
        id: String,
        source: serde_json::Error,
    },
}

impl TryFrom<StoredMessage> for Message {
    type Error = DecodeError;

    fn try_from(raw: StoredMessage) -> Result<Self, Self::Error> {
        let body = match raw.message_type.as_str() {
            "text" => MessageBody::Text(raw.content),
            "file" => {
                let file: FileDescriptor = serde_json::from_str(&raw.content).map_err(|source| {
                    DecodeError::FileDescriptor {
                        id: raw.id.to_string(),
                        source,
                    }
                })?;
                MessageBody::File(file)
            }
            other => return Err(DecodeError::UnknownKind(other.to_string())),
        };

        Ok(Message {
            id: raw.id,
            room_id: raw.room_id,
            author_id: raw.user_id,
            author_name: raw.username,
            body,
            created_at: raw.created_at,
        })
    }
}

/// Decode one inbound push frame into a message.
pub fn decode_message(frame: &str) -> Result<Message, DecodeError> {
    let raw: StoredMessage = serde_json::from_str(frame)?;
    Message::try_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;

    #[test]
    fn join_room_frame_shape() {
        let cmd = ClientCommand::JoinRoom {
            room_id: RoomId::from("R1"),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "join_room", "data": { "room_id": "R1" } })
        );
    }

    #[test]
    fn decodes_text_frame() {
        let frame = r#"{"id":"m1","room_id":"R1","user_id":"U1","content":"hi","message_type":"text","created_at":"2024-05-01T10:00:00Z"}"#;
        let msg = decode_message(frame).unwrap();
        assert_eq!(msg.id.as_str(), "m1");
        assert_eq!(msg.room_id.as_str(), "R1");
        assert_eq!(msg.kind(), MessageKind::Text);
        assert_eq!(msg.body, MessageBody::Text("hi".into()));
        assert_eq!(msg.author_name, None);
    }

    #[test]
    fn decodes_file_frame() {
        let frame = serde_json::json!({
            "id": "m2",
            "room_id": "R1",
            "user_id": "U1",
            "username": "alice",
            "content": r#"{"id":"f1","url":"/api/files/f1","filename":"a.bin","size":2097152}"#,
            "message_type": "file",
            "created_at": "2024-05-01T10:00:00Z",
        })
        .to_string();

        let msg = decode_message(&frame).unwrap();
        assert_eq!(msg.author_name.as_deref(), Some("alice"));
        match &msg.body {
            MessageBody::File(file) => {
                assert_eq!(file.filename, "a.bin");
                assert_eq!(file.size_bytes, 2_097_152);
            }
            other => panic!("expected file body, got {:?}", other),
        }
        assert_eq!(msg.preview(), "a.bin (2 MB)");
    }

    #[test]
    fn rejects_unknown_kind() {
        let frame = r#"{"id":"m1","room_id":"R1","user_id":"U1","content":"x","message_type":"sticker","created_at":"2024-05-01T10:00:00Z"}"#;
        assert!(matches!(
            decode_message(frame),
            Err(DecodeError::UnknownKind(kind)) if kind == "sticker"
        ));
    }

    #[test]
    fn rejects_malformed_file_descriptor() {
        let frame = r#"{"id":"m1","room_id":"R1","user_id":"U1","content":"not json","message_type":"file","created_at":"2024-05-01T10:00:00Z"}"#;
        assert!(matches!(
            decode_message(frame),
            Err(DecodeError::FileDescriptor { .. })
        ));
    }

    #[test]
    fn rejects_non_message_frames() {
        assert!(matches!(
            decode_message(r#"{"type":"presence"}"#),
            Err(DecodeError::Shape(_))
        ));
        assert!(decode_message("not json at all").is_err());
    }
}
