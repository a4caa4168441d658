//! Notification boundary.
//!
//! The engine produces plain title/message pairs; rendering and delivery
//! belong to whoever implements [`Notifier`]. The default implementation
//! just logs, which is what the headless service wants.

use tracing::info;

pub const NOTIFY_TITLE: &str = "File Association Guard";

/// How many extensions a batched notification names before truncating.
pub const MAX_NOTIFY_EXTS: usize = 6;

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Logs notifications instead of delivering them.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        info!(title, message, "notification");
    }
}

/// Comma-join an extension list, truncated with a `(+N)` suffix past
/// [`MAX_NOTIFY_EXTS`] so one stubborn batch cannot produce a wall of text.
pub fn format_ext_list(exts: &[String]) -> String {
    let exts: Vec<&str> = exts
        .iter()
        .map(|e| e.as_str())
        .filter(|e| !e.is_empty())
        .collect();
    if exts.len() <= MAX_NOTIFY_EXTS {
        return exts.join(", ");
    }
    let head = exts[..MAX_NOTIFY_EXTS].join(", ");
    format!("{head} ... (+{})", exts.len() - MAX_NOTIFY_EXTS)
}
