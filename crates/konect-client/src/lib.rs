pub mod api;
pub mod channel;
pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod notice;
pub mod session;
pub mod timeline;

pub use api::{ChatApi, Credentials, HttpApi};
pub use channel::{ChannelEvent, ChannelState, PushConnector, RealtimeChannel, WsConnector};
pub use chat::{ChatSession, SessionUpdate};
pub use config::ClientConfig;
pub use error::ClientError;
pub use history::RoomHistoryLoader;
pub use notice::{Notice, NoticeBoard, NoticeKind};
pub use session::{Session, SessionStore};
pub use timeline::{Appended, MessageTimeline};
