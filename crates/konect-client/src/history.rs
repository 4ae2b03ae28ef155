use tracing::{debug, warn};

use konect_types::{Message, RoomId};

use crate::api::ChatApi;
use crate::error::ClientError;

/// One-shot history fetch for a room.
pub struct RoomHistoryLoader<'a, A> {
    api: &'a A,
}

impl<'a, A: ChatApi> RoomHistoryLoader<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Fetch the last `limit` messages, oldest first. Exactly one request per
    /// call; failures propagate unretried. The server answers newest first,
    /// so the page is reversed, then sorted by (created_at, id) in case the
    /// server order was something else. Entries that fail to decode are
    /// logged and skipped.
    pub async fn load_history(
        &self,
        token: &str,
        room_id: &RoomId,
        limit: u32,
    ) -> Result<Vec<Message>, ClientError> {
        let page = self.api.fetch_history(token, room_id, limit).await?;
        let fetched = page.len();

        let mut messages: Vec<Message> = page
            .into_iter()
            .rev()
            .filter_map(|raw| {
                let id = raw.id.clone();
                match Message::try_from(raw) {
                    Ok(msg) => Some(msg),
                    Err(e) => {
                        warn!("Dropping stored message {} in room {}: {}", id, room_id, e);
                        None
                    }
                }
            })
            .collect();
        messages.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

        debug!("Loaded {}/{} messages for room {}", messages.len(), fetched, room_id);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};
    use konect_types::api::{AuthResponse, StoredMessage};
    use konect_types::{FileDescriptor, MessageKind, Room};

    use super::*;
    use crate::api::Credentials;

    struct PagedApi {
        page: Mutex<Result<Vec<StoredMessage>, ClientError>>,
        calls: AtomicUsize,
    }

    impl PagedApi {
        fn new(page: Result<Vec<StoredMessage>, ClientError>) -> Self {
            Self {
                page: Mutex::new(page),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ChatApi for PagedApi {
        async fn authenticate(&self, _: &Credentials) -> Result<AuthResponse, ClientError> {
            unimplemented!()
        }
        async fn list_rooms(&self, _: &str) -> Result<Vec<Room>, ClientError> {
            unimplemented!()
        }
        async fn create_room(&self, _: &str, _: &str, _: Option<&str>) -> Result<Room, ClientError> {
            unimplemented!()
        }
        async fn fetch_history(
            &self,
            _: &str,
            _: &RoomId,
            _: u32,
        ) -> Result<Vec<StoredMessage>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::mem::replace(&mut *self.page.lock().unwrap(), Ok(vec![]))
        }
        async fn post_message(&self, _: &str, _: &RoomId, _: &str, _: MessageKind) -> Result<(), ClientError> {
            unimplemented!()
        }
        async fn upload_file(&self, _: &str, _: &str, _: Vec<u8>) -> Result<FileDescriptor, ClientError> {
            unimplemented!()
        }
    }

    fn stored(id: &str, secs: i64, kind: &str, content: &str) -> StoredMessage {
        StoredMessage {
            id: id.into(),
            room_id: "R1".into(),
            user_id: "U1".into(),
            username: None,
            content: content.into(),
            message_type: kind.into(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn reverses_newest_first_page() {
        let api = PagedApi::new(Ok(vec![
            stored("m3", 30, "text", "c"),
            stored("m2", 20, "text", "b"),
            stored("m1", 10, "text", "a"),
        ]));

        let messages = RoomHistoryLoader::new(&api)
            .load_history("T", &RoomId::from("R1"), 50)
            .await
            .unwrap();

        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn skips_undecodable_entries() {
        let api = PagedApi::new(Ok(vec![
            stored("m2", 20, "file", "{broken"),
            stored("m1", 10, "text", "a"),
        ]));

        let messages = RoomHistoryLoader::new(&api)
            .load_history("T", &RoomId::from("R1"), 50)
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id.as_str(), "m1");
    }

    #[tokio::test]
    async fn auth_error_is_not_retried() {
        let api = PagedApi::new(Err(ClientError::Auth("Invalid token".into())));

        let result = RoomHistoryLoader::new(&api)
            .load_history("T", &RoomId::from("R1"), 50)
            .await;

        assert!(matches!(result, Err(ClientError::Auth(_))));
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }
}
