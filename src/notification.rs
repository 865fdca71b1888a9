//! Transient outcome messages shown after each operation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const MAX_RETAINED: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub raised_at: Instant,
}

impl Notification {
    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

/// Bounded queue of notifications. Only the newest one is ever displayed,
/// and only until it expires.
#[derive(Debug)]
pub struct Notifications {
    queue: VecDeque<Notification>,
    display_for: Duration,
}

impl Notifications {
    pub fn new(display_for: Duration) -> Self {
        Self {
            queue: VecDeque::with_capacity(MAX_RETAINED),
            display_for,
        }
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NotificationKind::Success, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NotificationKind::Error, message.into());
    }

    fn push(&mut self, kind: NotificationKind, message: String) {
        if self.queue.len() == MAX_RETAINED {
            let _ = self.queue.pop_front();
        }
        self.queue.push_back(Notification {
            kind,
            message,
            raised_at: Instant::now(),
        });
    }

    pub fn active(&self) -> Option<&Notification> {
        self.active_at(Instant::now())
    }

    pub fn active_at(&self, now: Instant) -> Option<&Notification> {
        self.queue
            .back()
            .filter(|n| now.saturating_duration_since(n.raised_at) < self.display_for)
    }

    /// Everything still retained, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter()
    }
}
