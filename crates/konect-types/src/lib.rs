pub mod api;
pub mod events;
pub mod format;
pub mod models;

pub use format::format_file_size;
pub use models::{
    FileDescriptor, Identity, Message, MessageBody, MessageId, MessageKind, Room, RoomId, UserId,
};
