use std::collections::HashSet;

use tracing::debug;

use konect_types::{Message, MessageId, RoomId};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// Inserted at this position.
    Inserted(usize),
    /// Id already present; nothing changed.
    Duplicate,
}

/// Ordered, duplicate-free messages for the active room. Sorted by
/// (created_at, id); every input is checked against the current scope.
#[derive(Debug, Default)]
pub struct MessageTimeline {
    scope: Option<RoomId>,
    entries: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl MessageTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self) -> Option<&RoomId> {
        self.scope.as_ref()
    }

    /// Drop all entries and bind to `room_id`.
    pub fn reset(&mut self, room_id: RoomId) {
        self.entries.clear();
        self.ids.clear();
        self.scope = Some(room_id);
    }

    /// Drop all entries and unbind; every later input is a scope mismatch.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
        self.scope = None;
    }

    fn check_scope(&self, room_id: &RoomId) -> Result<(), ClientError> {
        if self.scope.as_ref() == Some(room_id) {
            Ok(())
        } else {
            Err(ClientError::ScopeMismatch {
                expected: self.scope.clone(),
                actual: room_id.clone(),
            })
        }
    }

    /// Install a history page fetched for `room_id`. The page replaces the
    /// content, except that anything pushed since `reset` and missing from the
    /// page is kept, so a push that beat the history response is not lost.
    pub fn load_bulk(&mut self, room_id: &RoomId, ordered: Vec<Message>) -> Result<(), ClientError> {
        self.check_scope(room_id)?;

        let early = std::mem::take(&mut self.entries);
        self.ids.clear();

        for msg in ordered {
            if msg.room_id != *room_id {
                debug!("History page for {} carried message {} of room {}", room_id, msg.id, msg.room_id);
                continue;
            }
            if self.ids.insert(msg.id.clone()) {
                self.entries.push(msg);
            }
        }
        if !self.entries.is_sorted_by(|a, b| a.order_key() <= b.order_key()) {
            self.entries.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        }

        for msg in early {
            let _ = self.append(msg);
        }
        Ok(())
    }

    /// Ordered insert of one message. Messages for another room are rejected
    /// with `ScopeMismatch`; a repeated id is a no-op.
    pub fn append(&mut self, message: Message) -> Result<Appended, ClientError> {
        self.check_scope(&message.room_id)?;

        if self.ids.contains(&message.id) {
            return Ok(Appended::Duplicate);
        }

        let pos = self
            .entries
            .partition_point(|m| m.order_key() <= message.order_key());
        self.ids.insert(message.id.clone());
        self.entries.insert(pos, message);
        Ok(Appended::Inserted(pos))
    }

    pub fn snapshot(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
