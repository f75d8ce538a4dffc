//! Transient user notifications
//!
//! The viewer shows at most one notification at a time. A newer one replaces
//! the older, and each hides itself once its time-to-live has passed.

use std::time::Duration;

use tokio::time::Instant;

/// Default time a notification stays visible
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Something the user asked for happened
    Success,
    /// Something went wrong
    Error,
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity
    pub level: NotificationLevel,
    /// Text to show
    pub message: String,
}

impl Notification {
    /// Success notification
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    /// Error notification
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Holds the currently visible notification
#[derive(Debug)]
pub struct NotificationCenter {
    ttl: Duration,
    current: Option<(Notification, Instant)>,
}

impl NotificationCenter {
    /// Create a center whose notifications hide after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    /// Show a notification, replacing any visible one
    pub fn push(&mut self, notification: Notification) {
        tracing::debug!(
            level = ?notification.level,
            message = %notification.message,
            "Notification raised"
        );
        self.current = Some((notification, Instant::now()));
    }

    /// The visible notification, if it has not expired
    pub fn current(&self) -> Option<&Notification> {
        self.current
            .as_ref()
            .filter(|(_, raised_at)| raised_at.elapsed() < self.ttl)
            .map(|(notification, _)| notification)
    }

    /// Hide the visible notification
    pub fn dismiss(&mut self) {
        self.current = None;
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}
