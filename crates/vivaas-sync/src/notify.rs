//! # Notifications
//!
//! Outbound sink for user-facing toasts. The host UI provides an
//! implementation; the sync layer only decides *what* to say.

use tracing::{info, warn};
use vivaas_core::{Notification, Severity};

/// Receives user-facing notifications from the sync layer.
///
/// Implementations must not block: the service calls this inline.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Info => info!(
                kind = ?notification.kind,
                title = %notification.title,
                "{}",
                notification.description
            ),
            Severity::Warning | Severity::Destructive => warn!(
                kind = ?notification.kind,
                title = %notification.title,
                "{}",
                notification.description
            ),
        }
    }
}

/// Drops every notification.
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// Collects notifications for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    seen: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications().into_iter().map(|n| n.title).collect()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}
