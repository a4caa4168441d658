//! In-memory, size-bounded event log.
//!
//! Every state-changing action and every monitor outcome appends one entry.
//! The log is a ring: a fixed cap, oldest entries dropped first. Nothing here
//! touches disk; the presentation layer pulls read-only projections.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;

pub const MAX_LOG_ENTRIES: usize = 1200;

const MIN_VIEW_ROWS: usize = 10;
const MAX_VIEW_ROWS: usize = 1000;
pub const DEFAULT_VIEW_ROWS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ExtensionAdded,
    ExtensionRemoved,
    RemovedAll,
    ExtensionImported,
    DefaultsImported,
    BaselineCaptured,
    BaselineSet,
    BaselineCleared,
    SettingsUpdated,
    RestoreSucceeded,
    RestoreFailed,
    AutoRestoreSucceeded,
    AutoRestoreFailed,
}

impl EventKind {
    pub fn label(self) -> &'static str {
        match self {
            EventKind::ExtensionAdded => "extension added",
            EventKind::ExtensionRemoved => "extension removed",
            EventKind::RemovedAll => "all extensions removed",
            EventKind::ExtensionImported => "extension imported",
            EventKind::DefaultsImported => "current defaults imported",
            EventKind::BaselineCaptured => "baseline captured",
            EventKind::BaselineSet => "baseline set",
            EventKind::BaselineCleared => "baseline cleared",
            EventKind::SettingsUpdated => "settings updated",
            EventKind::RestoreSucceeded => "restore succeeded",
            EventKind::RestoreFailed => "restore failed",
            EventKind::AutoRestoreSucceeded => "auto-restore succeeded",
            EventKind::AutoRestoreFailed => "auto-restore failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventEntry {
    pub timestamp: DateTime<Utc>,
    /// Normalized extension key, or empty for whole-state events.
    pub ext: String,
    pub kind: EventKind,
    pub detail: String,
}

pub struct EventLog {
    inner: Mutex<VecDeque<EventEntry>>,
    cap: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(MAX_LOG_ENTRIES)
    }
}

impl EventLog {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            cap: cap.max(1),
        }
    }

    pub fn append(&self, ext: &str, kind: EventKind, detail: impl Into<String>) {
        let entry = EventEntry {
            timestamp: Utc::now(),
            ext: ext.to_string(),
            kind,
            detail: detail.into(),
        };
        let mut log = self.inner.lock();
        log.push_back(entry);
        while log.len() > self.cap {
            log.pop_front();
        }
    }

    /// Newest-first view, optionally filtered to one extension. `limit` is
    /// clamped to a sane display range.
    pub fn recent(&self, ext_filter: Option<&str>, limit: usize) -> Vec<EventEntry> {
        let limit = limit.clamp(MIN_VIEW_ROWS, MAX_VIEW_ROWS);
        let log = self.inner.lock();
        log.iter()
            .rev()
            .filter(|entry| match ext_filter {
                Some(ext) => entry.ext == ext,
                None => true,
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
