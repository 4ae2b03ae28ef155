use std::time::Instant;

use konect_client::NoticeBoard;

/// Terminal rendering of the notice board. A notice is printed once when it
/// appears and repeated above each listing until its ttl runs out.
#[derive(Debug, Default)]
pub struct Banner {
    printed: Option<Instant>,
}

impl Banner {
    /// Text of a live notice that has not been printed yet.
    pub fn fresh(&mut self, board: &NoticeBoard, now: Instant) -> Option<String> {
        let notice = board.current(now)?;
        if self.printed == Some(notice.raised_at) {
            return None;
        }
        self.printed = Some(notice.raised_at);
        Some(notice.message.clone())
    }

    /// Text to show above a listing while the notice is live.
    pub fn live(&mut self, board: &NoticeBoard, now: Instant) -> Option<String> {
        let notice = board.current(now)?;
        self.printed = Some(notice.raised_at);
        Some(notice.message.clone())
    }
}
