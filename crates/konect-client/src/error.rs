use konect_types::RoomId;
use konect_types::events::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad credentials or an expired/rejected token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport failure on a request/response call.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status other than 401/403.
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },

    /// The push channel failed to open or was closed by the peer.
    #[error("channel error: {0}")]
    Channel(String),

    #[error("parse error: {0}")]
    Parse(#[from] DecodeError),

    /// A result arrived for a room that is no longer active.
    #[error("result for room {actual} does not match active scope {expected:?}")]
    ScopeMismatch {
        expected: Option<RoomId>,
        actual: RoomId,
    },

    #[error("session storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("not signed in")]
    NotSignedIn,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Channel(e.to_string())
    }
}
