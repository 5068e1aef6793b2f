//! Transient user notifications ("toasts").
//!
//! Each mutate call on a synchronizer publishes exactly one [`Notice`]. The
//! presentation layer subscribes and renders them; nobody listening is fine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Notices buffered per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 64;

/// How a notice should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A short message about the outcome of a user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Fan-out publisher for [`Notice`]s.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Receive every notice published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Error, message.into());
    }

    fn publish(&self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Success => tracing::info!(notice = %message, "Notify"),
            NoticeLevel::Error => tracing::warn!(notice = %message, "Notify"),
        }
        // No subscribers is not an error
        let _ = self.tx.send(Notice {
            level,
            message,
            at: Utc::now(),
        });
    }
}
