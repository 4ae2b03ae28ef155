#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::{sink, stream};
use tokio::sync::mpsc;

use konect_client::channel::{FrameSink, FrameStream};
use konect_client::{ChatApi, ClientConfig, ClientError, Credentials, PushConnector, SessionStore};
use konect_types::api::{AuthResponse, StoredMessage};
use konect_types::{FileDescriptor, Identity, MessageKind, Room, RoomId};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn room(id: &str) -> Room {
    Room {
        id: id.into(),
        name: format!("room {}", id),
        description: None,
    }
}

pub fn identity(id: &str) -> Identity {
    Identity {
        id: id.into(),
        username: format!("user-{}", id),
        email: None,
    }
}

pub fn stored_text(id: &str, room_id: &str, author: &str, content: &str, secs: i64) -> StoredMessage {
    StoredMessage {
        id: id.into(),
        room_id: room_id.into(),
        user_id: author.into(),
        username: None,
        content: content.into(),
        message_type: "text".into(),
        created_at: at(secs),
    }
}

pub fn frame(msg: &StoredMessage) -> String {
    serde_json::to_string(msg).unwrap()
}

pub fn temp_store() -> SessionStore {
    let path = std::env::temp_dir().join(format!("konect-test-{}.json", uuid::Uuid::new_v4()));
    SessionStore::open(path)
}

pub fn config() -> ClientConfig {
    ClientConfig::new("http://localhost:3000".parse().unwrap())
}

// -- Push transport --

/// The server's side of one fake push connection.
pub struct ServerEnd {
    pub room_id: RoomId,
    received: mpsc::UnboundedReceiver<String>,
    push: mpsc::UnboundedSender<Result<String, ClientError>>,
}

impl ServerEnd {
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.push.send(Ok(text.into()));
    }

    pub fn push_message(&self, msg: &StoredMessage) {
        self.push_text(frame(msg));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.push.send(Err(ClientError::Channel(reason.into())));
    }

    /// Next frame the client transmitted, if one arrives in time.
    pub async fn next_sent(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.received.recv()).await.ok().flatten()
    }

    /// True once the client has released its end of the connection.
    pub async fn wait_released(&self) -> bool {
        tokio::time::timeout(WAIT, self.push.closed()).await.is_ok()
    }

    pub fn is_open(&self) -> bool {
        !self.push.is_closed()
    }

    pub fn sent_now(&mut self) -> Option<String> {
        self.received.try_recv().ok()
    }
}

#[derive(Default)]
struct ConnectorState {
    accepted: VecDeque<ServerEnd>,
    opened: Vec<RoomId>,
    refuse_next: bool,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl FakeConnector {
    pub fn refuse_next(&self) {
        self.state.lock().unwrap().refuse_next = true;
    }

    /// Oldest connection not yet taken by the test.
    pub fn take_server(&self) -> ServerEnd {
        self.state
            .lock()
            .unwrap()
            .accepted
            .pop_front()
            .expect("no connection was opened")
    }

    pub fn opened(&self) -> Vec<RoomId> {
        self.state.lock().unwrap().opened.clone()
    }
}

impl PushConnector for FakeConnector {
    async fn open(&self, room_id: &RoomId) -> Result<(FrameSink, FrameStream), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.opened.push(room_id.clone());
        if std::mem::take(&mut state.refuse_next) {
            return Err(ClientError::Channel("connection refused".into()));
        }

        let (to_server, received) = mpsc::unbounded_channel::<String>();
        let (push, from_server) = mpsc::unbounded_channel::<Result<String, ClientError>>();

        let sink = sink::unfold(to_server, |tx, text: String| async move {
            tx.send(text)
                .map_err(|_| ClientError::Channel("server gone".into()))?;
            Ok::<_, ClientError>(tx)
        });
        let stream = stream::unfold(from_server, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        state.accepted.push_back(ServerEnd {
            room_id: room_id.clone(),
            received,
            push,
        });
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

// -- Request/response API --

#[derive(Default)]
pub struct ApiState {
    pub auth: Option<AuthResponse>,
    pub rooms: Vec<Room>,
    pub history: HashMap<RoomId, Vec<StoredMessage>>,
    pub history_error: Option<ClientError>,
    pub fail_posts: bool,
    pub fail_uploads: HashSet<String>,
    pub posted: Vec<(RoomId, String, MessageKind)>,
    pub uploaded: Vec<String>,
    pub history_calls: usize,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    pub state: Arc<Mutex<ApiState>>,
}

impl FakeApi {
    pub fn with_login(user: Identity, token: &str) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().auth = Some(AuthResponse {
            token: token.into(),
            user,
        });
        api
    }

    pub fn posted(&self) -> Vec<(RoomId, String, MessageKind)> {
        self.state.lock().unwrap().posted.clone()
    }
}

impl ChatApi for FakeApi {
    async fn authenticate(&self, _: &Credentials) -> Result<AuthResponse, ClientError> {
        self.state
            .lock()
            .unwrap()
            .auth
            .clone()
            .ok_or_else(|| ClientError::Auth("Invalid credentials".into()))
    }

    async fn list_rooms(&self, _: &str) -> Result<Vec<Room>, ClientError> {
        Ok(self.state.lock().unwrap().rooms.clone())
    }

    async fn create_room(&self, _: &str, name: &str, description: Option<&str>) -> Result<Room, ClientError> {
        Ok(Room {
            id: format!("new-{}", name).into(),
            name: name.into(),
            description: description.map(str::to_owned),
        })
    }

    async fn fetch_history(&self, _: &str, room_id: &RoomId, _: u32) -> Result<Vec<StoredMessage>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.history_calls += 1;
        if let Some(e) = state.history_error.take() {
            return Err(e);
        }
        // Newest first, like the server.
        let mut page = state.history.get(room_id).cloned().unwrap_or_default();
        page.reverse();
        Ok(page)
    }

    async fn post_message(&self, _: &str, room_id: &RoomId, content: &str, kind: MessageKind) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_posts {
            return Err(ClientError::Network("connection reset".into()));
        }
        state.posted.push((room_id.clone(), content.to_owned(), kind));
        Ok(())
    }

    async fn upload_file(&self, _: &str, filename: &str, bytes: Vec<u8>) -> Result<FileDescriptor, ClientError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_uploads.contains(filename) {
            return Err(ClientError::Api {
                status: 413,
                message: "File too large".into(),
            });
        }
        state.uploaded.push(filename.to_owned());
        Ok(FileDescriptor {
            url: format!("/api/files/{}", filename),
            filename: filename.to_owned(),
            size_bytes: bytes.len() as u64,
        })
    }
}
