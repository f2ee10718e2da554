use std::collections::VecDeque;

use warptray_connection::{Notice, NoticeLevel};

/// Notices kept at most; the oldest is dropped first.
pub const MAX_NOTICES: usize = 8;

/// Display duration for info notices in milliseconds.
const INFO_DURATION_MS: u64 = 4000;

/// Error notices stay up longer.
const ERROR_DURATION_MS: u64 = 6000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedNotice {
    pub id: u64,
    pub notice: Notice,
    pub duration_ms: u64,
}

/// Transient notices with monotonic IDs.
///
/// Dismissal timers belong to the renderer; this only holds the queue.
#[derive(Debug, Clone, Default)]
pub struct NoticeQueue {
    notices: VecDeque<QueuedNotice>,
    next_id: u64,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a notice and returns its ID.
    pub fn push(&mut self, notice: Notice) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let duration_ms = match notice.level {
            NoticeLevel::Error => ERROR_DURATION_MS,
            NoticeLevel::Info => INFO_DURATION_MS,
        };
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(QueuedNotice {
            id,
            notice,
            duration_ms,
        });
        id
    }

    /// Removes a notice by ID. Returns `true` if it was still queued.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let len_before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != len_before
    }

    pub fn get(&self, id: u64) -> Option<&QueuedNotice> {
        self.notices.iter().find(|n| n.id == id)
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedNotice> {
        self.notices.iter()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut q = NoticeQueue::new();
        let a = q.push(Notice::error("Service Error", "down"));
        let b = q.push(Notice::info("Registration", "ok"));
        assert_eq!((a, b), (0, 1));

        let titles: Vec<&str> = q.iter().map(|n| n.notice.title.as_str()).collect();
        assert_eq!(titles, ["Service Error", "Registration"]);
    }

    #[test]
    fn errors_stay_longer() {
        let mut q = NoticeQueue::new();
        let e = q.push(Notice::error("x", "y"));
        let i = q.push(Notice::info("x", "y"));
        assert_eq!(q.get(e).unwrap().duration_ms, 6000);
        assert_eq!(q.get(i).unwrap().duration_ms, 4000);
    }

    #[test]
    fn dismiss_removes_once() {
        let mut q = NoticeQueue::new();
        let id = q.push(Notice::info("a", "b"));
        assert!(q.dismiss(id));
        assert!(!q.dismiss(id));
        assert!(q.is_empty());
    }

    #[test]
    fn oldest_dropped_when_full() {
        let mut q = NoticeQueue::new();
        for n in 0..MAX_NOTICES + 2 {
            q.push(Notice::info(format!("n{n}"), ""));
        }
        assert_eq!(q.len(), MAX_NOTICES);
        assert!(q.get(0).is_none());
        assert!(q.get(1).is_none());
        assert_eq!(q.iter().next().unwrap().id, 2);
    }
}
