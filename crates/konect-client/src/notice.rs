use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Login-flow problem: bad credentials or a rejected token.
    Auth,
    Network,
    Channel,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub raised_at: Instant,
}

/// Transient error banner. Holds one notice; a new one replaces the old, and
/// anything older than the ttl is no longer shown.
#[derive(Debug)]
pub struct NoticeBoard {
    ttl: Duration,
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    pub fn raise(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.current = Some(Notice {
            kind,
            message: message.into(),
            raised_at: Instant::now(),
        });
    }

    /// The notice to display at `now`, if it has not expired.
    pub fn current(&self, now: Instant) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.raised_at) < self.ttl)
    }

    /// When the current notice stops being shown.
    pub fn expires_at(&self) -> Option<Instant> {
        self.current.as_ref().map(|n| n.raised_at + self.ttl)
    }

    /// Most recent notice regardless of age.
    pub fn latest(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}
