//! User-visible notices (the toast layer).
//!
//! Flows never render anything themselves; they hand short messages to a
//! [`Notifier`] and carry on.

use parking_lot::Mutex;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Sink for user-visible notices
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);

    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }
}

/// Sends notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => tracing::info!(notice = %message, "Notice"),
            NoticeLevel::Success => tracing::info!(notice = %message, "Success notice"),
            NoticeLevel::Error => tracing::warn!(notice = %message, "Error notice"),
        }
    }
}

/// Keeps notices in memory until drained
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every notice recorded so far
    pub fn drain(&self) -> Vec<(NoticeLevel, String)> {
        std::mem::take(&mut *self.notices.lock())
    }

    /// Messages recorded at `level`, oldest first
    pub fn messages(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().push((level, message.to_string()));
    }
}
