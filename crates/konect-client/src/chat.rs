use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use konect_types::{Identity, Message, MessageKind, Room, RoomId};

use crate::api::{ChatApi, Credentials};
use crate::channel::{ChannelEvent, ChannelState, PushConnector, RealtimeChannel};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::history::RoomHistoryLoader;
use crate::notice::{NoticeBoard, NoticeKind};
use crate::session::{Session, SessionStore};
use crate::timeline::{Appended, MessageTimeline};

/// What routing one channel event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A message was inserted into the timeline at this index.
    Appended(usize),
    /// The active room's channel went away; reselect the room to resume.
    Disconnected(RoomId),
    /// The store dropped its credential; rooms, timeline and channel are gone.
    SignedOut,
    /// Duplicate, stale or out-of-scope event; nothing changed.
    Ignored,
}

/// Orchestrates one signed-in user's view: rooms, the active room's timeline
/// and its push channel. Request/response failures end up on the notice
/// board, never as errors to the caller.
pub struct ChatSession<A, C> {
    api: A,
    store: SessionStore,
    signed_in: watch::Receiver<Option<Session>>,
    channel: RealtimeChannel<C>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    timeline: MessageTimeline,
    notices: NoticeBoard,
    rooms: Vec<Room>,
    active_room: Option<Room>,
    history_limit: u32,
}

impl<A: ChatApi, C: PushConnector> ChatSession<A, C> {
    pub fn new(api: A, connector: C, store: SessionStore, config: &ClientConfig) -> Self {
        let (channel, events) = RealtimeChannel::new(connector);
        let signed_in = store.subscribe();
        Self {
            api,
            store,
            signed_in,
            channel,
            events,
            timeline: MessageTimeline::new(),
            notices: NoticeBoard::new(config.notice_ttl),
            rooms: Vec::new(),
            active_room: None,
            history_limit: config.history_limit,
        }
    }

    /// Pick up a persisted session: when signed in, load the room list.
    pub async fn start(&mut self) {
        if self.store.is_signed_in() {
            self.load_rooms().await;
        }
    }

    fn surface(&mut self, context: &str, error: ClientError) {
        let kind = match error {
            ClientError::Auth(_) | ClientError::NotSignedIn => NoticeKind::Auth,
            ClientError::Channel(_) => NoticeKind::Channel,
            _ => NoticeKind::Network,
        };
        warn!("{}: {}", context, error);
        self.notices.raise(kind, format!("{}: {}", context, error));
    }

    fn token(&mut self, context: &str) -> Option<String> {
        let token = self.store.current_token();
        if token.is_none() {
            self.surface(context, ClientError::NotSignedIn);
        }
        token
    }

    pub async fn authenticate(&mut self, credentials: Credentials) -> bool {
        let auth = match self.api.authenticate(&credentials).await {
            Ok(auth) => auth,
            Err(e) => {
                self.surface("Authentication failed", e);
                return false;
            }
        };

        info!("Signed in as {}", auth.user.username);
        if let Err(e) = self.store.set_session(auth.token, auth.user) {
            self.surface("Failed to save session", e);
        }
        self.load_rooms().await;
        true
    }

    /// Drop the credential. The teardown follows from the store's sign-out
    /// notification, the same path an external `clear_session` takes.
    pub fn logout(&mut self) {
        if let Err(e) = self.store.clear_session() {
            warn!("Failed to clear session: {}", e);
        }
        self.follow_store();
    }

    /// Apply the latest sign-in change from the store, if any.
    fn follow_store(&mut self) -> Option<SessionUpdate> {
        if !self.signed_in.has_changed().unwrap_or(false) {
            return None;
        }
        if self.signed_in.borrow_and_update().is_some() {
            return None;
        }

        self.channel.close();
        self.timeline.clear();
        self.active_room = None;
        self.rooms.clear();
        info!("Signed out");
        Some(SessionUpdate::SignedOut)
    }

    pub async fn load_rooms(&mut self) -> bool {
        let Some(token) = self.token("Failed to load rooms") else {
            return false;
        };
        match self.api.list_rooms(&token).await {
            Ok(rooms) => {
                self.rooms = rooms;
                true
            }
            Err(e) => {
                self.surface("Failed to load rooms", e);
                false
            }
        }
    }

    /// Create a room, put it at the front of the list and switch to it.
    pub async fn create_room(&mut self, name: &str, description: Option<&str>) -> Option<Room> {
        let token = self.token("Failed to create room")?;
        let room = match self.api.create_room(&token, name, description).await {
            Ok(room) => room,
            Err(e) => {
                self.surface("Failed to create room", e);
                return None;
            }
        };

        self.rooms.insert(0, room.clone());
        self.select_room(room.clone()).await;
        Some(room)
    }

    /// Switch the active room: close the old channel, rebuild the timeline
    /// from history, then open and join a channel for the new room. A history
    /// failure is surfaced but the channel is still opened.
    pub async fn select_room(&mut self, room: Room) {
        self.channel.close();

        let room_id = room.id.clone();
        self.timeline.reset(room_id.clone());
        info!("Selected room {} ({})", room.name, room_id);
        self.active_room = Some(room);

        let Some(token) = self.token("Failed to load messages") else {
            return;
        };

        let history = RoomHistoryLoader::new(&self.api)
            .load_history(&token, &room_id, self.history_limit)
            .await;
        match history {
            Ok(messages) => {
                if let Err(e) = self.timeline.load_bulk(&room_id, messages) {
                    debug!("Discarding history: {}", e);
                }
            }
            Err(e) => self.surface("Failed to load messages", e),
        }

        if let Err(e) = self.channel.connect(room_id).await {
            self.surface("Failed to connect", e);
        }
    }

    /// Post the trimmed draft to the active room. The draft is cleared only
    /// when the server accepts it; the message itself shows up through the
    /// push channel.
    pub async fn send_message(&mut self, draft: &mut String) -> bool {
        let content = draft.trim();
        if content.is_empty() {
            return false;
        }
        let Some(room_id) = self.active_room.as_ref().map(|r| r.id.clone()) else {
            return false;
        };
        let Some(token) = self.token("Failed to send message") else {
            return false;
        };

        match self
            .api
            .post_message(&token, &room_id, content, MessageKind::Text)
            .await
        {
            Ok(()) => {
                draft.clear();
                true
            }
            Err(e) => {
                self.surface("Failed to send message", e);
                false
            }
        }
    }

    /// Upload each file and post a file message for it, one at a time in
    /// order. A failure is surfaced and the rest of the batch continues.
    /// Returns the number of file messages posted.
    pub async fn upload_files(&mut self, files: Vec<(String, Vec<u8>)>) -> usize {
        let Some(room_id) = self.active_room.as_ref().map(|r| r.id.clone()) else {
            return 0;
        };
        let Some(token) = self.token("Upload error") else {
            return 0;
        };

        let mut posted = 0;
        for (filename, bytes) in files {
            let file = match self.api.upload_file(&token, &filename, bytes).await {
                Ok(file) => file,
                Err(e) => {
                    self.surface(&format!("Failed to upload {}", filename), e);
                    continue;
                }
            };

            let content = match serde_json::to_string(&file) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to encode descriptor for {}: {}", filename, e);
                    continue;
                }
            };
            match self
                .api
                .post_message(&token, &room_id, &content, MessageKind::File)
                .await
            {
                Ok(()) => posted += 1,
                Err(e) => self.surface(&format!("Failed to share {}", filename), e),
            }
        }
        posted
    }

    /// Wait for the next channel event or sign-out and apply it.
    pub async fn next_event(&mut self) -> Option<SessionUpdate> {
        loop {
            tokio::select! {
                event = self.events.recv() => return event.map(|e| self.route(e)),
                changed = self.signed_in.changed() => {
                    changed.ok()?;
                    if let Some(update) = self.follow_store() {
                        return Some(update);
                    }
                }
            }
        }
    }

    /// Apply a pending sign-out and every event already queued, without
    /// waiting.
    pub fn pending(&mut self) -> Vec<SessionUpdate> {
        let mut updates: Vec<SessionUpdate> = self.follow_store().into_iter().collect();
        while let Ok(event) = self.events.try_recv() {
            updates.push(self.route(event));
        }
        updates
    }

    fn route(&mut self, event: ChannelEvent) -> SessionUpdate {
        match event {
            ChannelEvent::Message { message, .. } => match self.timeline.append(message) {
                Ok(Appended::Inserted(pos)) => SessionUpdate::Appended(pos),
                Ok(Appended::Duplicate) => SessionUpdate::Ignored,
                Err(e) => {
                    debug!("Discarding push: {}", e);
                    SessionUpdate::Ignored
                }
            },
            ChannelEvent::Disconnected {
                generation,
                room_id,
                error,
            } => {
                if generation != self.channel.generation() {
                    return SessionUpdate::Ignored;
                }
                let error = error.unwrap_or_else(|| ClientError::Channel("closed by server".into()));
                self.surface(&format!("Disconnected from room {}", room_id), error);
                SessionUpdate::Disconnected(room_id)
            }
        }
    }

    pub fn timeline(&self) -> &[Message] {
        self.timeline.snapshot()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn active_room(&self) -> Option<&Room> {
        self.active_room.as_ref()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.store.current_identity()
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.is_signed_in()
    }

    /// Whether `message` was written by the signed-in user.
    pub fn is_own(&self, message: &Message) -> bool {
        self.store
            .current_identity()
            .is_some_and(|me| me.id == message.author_id)
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn dismiss_notice(&mut self) {
        self.notices.dismiss();
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}
