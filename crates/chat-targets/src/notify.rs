use std::sync::Mutex;

use serde::Serialize;
use tracing::warn;

/// User-facing notice about a partial failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn size_limit_exceeded() -> Self {
        Self::new(
            "Size limit exceeded",
            "The message was not sent because it exceeded the configured limit.",
        )
    }

    pub fn model_unavailable(reason: &str) -> Self {
        let reason = if reason.trim().is_empty() {
            "Unable to select model."
        } else {
            reason
        };
        Self::new("Model unavailable", reason)
    }

    pub fn input_failed() -> Self {
        Self::new("Input failed", "Could not locate the chat input field.")
    }

    pub fn input_unverified() -> Self {
        Self::new(
            "Input unverified",
            "The chat input did not accept the message after all retries.",
        )
    }

    pub fn auto_send_failed() -> Self {
        Self::new(
            "Auto-send failed",
            "Input was filled but sending did not succeed.",
        )
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Surfaces notifications through the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        warn!(title = %notification.title, "{}", notification.message);
    }
}

/// Keeps notifications for later display or inspection.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.all().into_iter().map(|n| n.title).collect()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(notification);
        }
    }
}
