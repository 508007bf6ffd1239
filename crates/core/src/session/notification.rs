//! Transient, auto-dismissing notifications.

use crate::error::AppError;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A non-blocking message shown for a fixed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub shown_at: Instant,
    pub duration: Duration,
}

impl Notification {
    pub fn info(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
            shown_at: Instant::now(),
            duration,
        }
    }

    pub fn error(error: &AppError, duration: Duration) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: error.to_string(),
            shown_at: Instant::now(),
            duration,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= self.duration
    }
}

/// Notifications currently on screen, oldest first.
#[derive(Debug, Default)]
pub struct Notifications {
    active: Vec<Notification>,
}

impl Notifications {
    pub fn push(&mut self, notification: Notification) {
        self.active.push(notification);
    }

    /// Drops every notification whose display time has elapsed.
    pub fn prune(&mut self, now: Instant) {
        self.active.retain(|n| !n.is_expired(now));
    }

    pub fn active(&self) -> &[Notification] {
        &self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_after_duration() {
        let mut queue = Notifications::default();
        let shown = Notification::info("Saved", Duration::from_secs(3));
        let start = shown.shown_at;
        queue.push(shown);

        queue.prune(start + Duration::from_millis(2999));
        assert_eq!(queue.active().len(), 1);

        queue.prune(start + Duration::from_secs(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_error_message() {
        let n = Notification::error(&AppError::validation("name must not be empty"), Duration::from_secs(3));
        assert_eq!(n.level, NotificationLevel::Error);
        assert_eq!(n.message, "Validation failed: name must not be empty");
    }
}
