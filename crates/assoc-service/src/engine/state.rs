//! In-memory guard state and its read-only projections.
//!
//! The state lives behind one mutex owned by [`super::GuardEngine`]; nothing
//! outside ever sees a reference into it, only snapshot copies. Invariant:
//! every baseline key is also a tracked extension — removal deletes both in
//! the same locked operation, so no orphaned baseline can exist.

use assoc_core::settings::{clamp_interval_secs, GuardConfig};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

pub(crate) struct GuardState {
    pub tracked: BTreeSet<String>,
    pub baselines: BTreeMap<String, String>,
    /// Last correction attempt per extension; entries expire naturally as
    /// time passes the cooldown window, they are never deleted.
    pub cooldowns: HashMap<String, DateTime<Utc>>,
    pub interval_secs: u64,
    pub notifications_enabled: bool,
    pub auto_restore_enabled: bool,
    pub auto_start_enabled: bool,
}

impl GuardState {
    /// Build from an already-sanitized config document.
    pub fn from_config(cfg: &GuardConfig) -> Self {
        Self {
            tracked: cfg.tracked_exts.iter().cloned().collect(),
            baselines: cfg.baselines.clone(),
            cooldowns: HashMap::new(),
            interval_secs: clamp_interval_secs(cfg.monitor_interval_secs),
            notifications_enabled: cfg.notifications_enabled,
            auto_restore_enabled: cfg.auto_restore_enabled,
            auto_start_enabled: cfg.auto_start_enabled,
        }
    }

    pub fn to_config(&self) -> GuardConfig {
        GuardConfig {
            tracked_exts: self.tracked.iter().cloned().collect(),
            baselines: self
                .baselines
                .iter()
                .filter(|(ext, progid)| self.tracked.contains(*ext) && !progid.is_empty())
                .map(|(ext, progid)| (ext.clone(), progid.clone()))
                .collect(),
            monitor_interval_secs: clamp_interval_secs(self.interval_secs),
            notifications_enabled: self.notifications_enabled,
            auto_restore_enabled: self.auto_restore_enabled,
            auto_start_enabled: self.auto_start_enabled,
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            tracked: self.tracked.iter().cloned().collect(),
            baselines: self.baselines.clone(),
            interval: Duration::from_secs(clamp_interval_secs(self.interval_secs)),
            notifications_enabled: self.notifications_enabled,
            auto_restore_enabled: self.auto_restore_enabled,
        }
    }
}

/// Consistent point-in-time copy for the monitor and the projections;
/// callers never observe a partially-updated state.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Sorted tracked extensions.
    pub tracked: Vec<String>,
    pub baselines: BTreeMap<String, String>,
    pub interval: Duration,
    pub notifications_enabled: bool,
    pub auto_restore_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsView {
    pub monitor_interval_secs: u64,
    pub notifications_enabled: bool,
    pub auto_restore_enabled: bool,
    pub auto_start_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    InSync,
    Drifted,
    NoBaseline,
}

impl SyncStatus {
    pub fn label(self) -> &'static str {
        match self {
            SyncStatus::InSync => "in sync",
            SyncStatus::Drifted => "drifted",
            SyncStatus::NoBaseline => "no baseline",
        }
    }
}

/// One row of the status table the presentation layer renders.
#[derive(Debug, Clone)]
pub struct StatusRow {
    pub ext: String,
    pub baseline_label: String,
    pub status: SyncStatus,
}
