//! The guard engine: tracked extensions, baselines, and every user-facing
//! action against them.
//!
//! Locking discipline: the state mutex is held for the duration of one
//! logical mutation or snapshot copy and released before any registry call
//! or broadcast — the lock is never held across an OS call. Persistence is a
//! best-effort save after each mutation; a failed save is logged, never
//! fatal.

mod state;

pub use state::{SettingsView, StateSnapshot, StatusRow, SyncStatus};
pub(crate) use state::GuardState;

use crate::discovery::{self, DEFAULT_CANDIDATE_LIMIT};
use crate::notify::{Notifier, NOTIFY_TITLE};
use crate::registry::AssocRegistry;
use crate::resolver;
use crate::restore::{self, RestoreOutcome};
use anyhow::{bail, Result};
use assoc_core::event_log::{EventEntry, EventKind, EventLog};
use assoc_core::ext::{is_valid_ext, normalize_ext};
use assoc_core::settings::{clamp_interval_secs, GuardConfig};
use assoc_core::storage;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub selected: usize,
    pub added: usize,
    pub captured: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultsImportSummary {
    pub found: usize,
    pub imported: usize,
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub processed: usize,
    pub succeeded: usize,
}

/// Whether a manual baseline edit set or cleared the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineChange {
    Set,
    Cleared,
}

pub struct GuardEngine {
    pub(crate) registry: Arc<dyn AssocRegistry>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) events: EventLog,
    pub(crate) state: Mutex<GuardState>,
    /// `None` disables persistence (tests, dry runs).
    config_path: Option<PathBuf>,
}

impl GuardEngine {
    pub fn from_config(
        registry: Arc<dyn AssocRegistry>,
        notifier: Arc<dyn Notifier>,
        cfg: GuardConfig,
        config_path: Option<PathBuf>,
    ) -> Self {
        let mut state = GuardState::from_config(&cfg.sanitized());
        // The machine's real startup registration wins over whatever the
        // config file remembers.
        state.auto_start_enabled = registry.startup_command().is_some();
        Self {
            registry,
            notifier,
            events: EventLog::default(),
            state: Mutex::new(state),
            config_path,
        }
    }

    // ── projections ─────────────────────────────────────────────────────

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.lock().snapshot()
    }

    pub fn settings(&self) -> SettingsView {
        let state = self.state.lock();
        SettingsView {
            monitor_interval_secs: state.interval_secs,
            notifications_enabled: state.notifications_enabled,
            auto_restore_enabled: state.auto_restore_enabled,
            auto_start_enabled: state.auto_start_enabled,
        }
    }

    pub fn baseline(&self, ext: &str) -> Option<String> {
        let key = normalize_ext(ext);
        if key.is_empty() {
            return None;
        }
        self.state.lock().baselines.get(&key).cloned()
    }

    /// Status table: one row per tracked extension, resolved against the
    /// registry outside the lock.
    pub fn status_rows(&self) -> Vec<StatusRow> {
        let snapshot = self.snapshot();
        let mut rows = Vec::with_capacity(snapshot.tracked.len());
        for ext in &snapshot.tracked {
            let baseline = snapshot.baselines.get(ext).cloned().unwrap_or_default();
            let status = if baseline.is_empty() {
                SyncStatus::NoBaseline
            } else {
                let current = resolver::effective_progid(&*self.registry, ext);
                if current.as_deref() == Some(baseline.as_str()) {
                    SyncStatus::InSync
                } else {
                    SyncStatus::Drifted
                }
            };
            rows.push(StatusRow {
                ext: ext.clone(),
                baseline_label: resolver::display_label(&*self.registry, &baseline),
                status,
            });
        }
        rows
    }

    /// Picker candidates with labels. A saved baseline that the OS no longer
    /// surfaces is inserted at the front so it stays selectable.
    pub fn baseline_candidates(&self, ext: &str) -> Vec<(String, String)> {
        let key = normalize_ext(ext);
        if key.is_empty() {
            return Vec::new();
        }
        let baseline = self.baseline(&key);
        let mut ids = discovery::candidate_progids(&*self.registry, &key, DEFAULT_CANDIDATE_LIMIT);
        if let Some(baseline) = baseline {
            if !ids.contains(&baseline) {
                ids.insert(0, baseline);
            }
        }
        ids.into_iter()
            .map(|id| {
                let label = resolver::picker_label(&*self.registry, &id);
                (id, label)
            })
            .collect()
    }

    pub fn log_rows(&self, ext_filter: Option<&str>, limit: usize) -> Vec<EventEntry> {
        let filter = ext_filter
            .map(normalize_ext)
            .filter(|key| !key.is_empty());
        self.events.recent(filter.as_deref(), limit)
    }

    // ── tracked-extension actions ───────────────────────────────────────

    /// Add one extension to the tracked set. Returns whether it was new.
    pub fn add_extension(&self, raw: &str) -> Result<bool> {
        let key = normalize_ext(raw);
        if !is_valid_ext(&key) {
            bail!("invalid extension: {raw:?}");
        }
        let newly_added = self.state.lock().tracked.insert(key.clone());
        self.persist();
        if newly_added {
            self.events.append(&key, EventKind::ExtensionAdded, "");
            self.notify(&format!("Now guarding {key}"));
        }
        Ok(newly_added)
    }

    /// Remove extensions from tracking; their baselines and cooldowns go in
    /// the same locked operation.
    pub fn remove_extensions(&self, exts: &[String]) -> Vec<String> {
        let mut removed = Vec::new();
        {
            let mut state = self.state.lock();
            for raw in exts {
                let key = normalize_ext(raw);
                if key.is_empty() {
                    continue;
                }
                state.baselines.remove(&key);
                state.cooldowns.remove(&key);
                if state.tracked.remove(&key) {
                    removed.push(key);
                }
            }
        }
        self.persist();
        for key in &removed {
            self.events.append(key, EventKind::ExtensionRemoved, "");
        }
        removed
    }

    pub fn remove_all(&self) -> usize {
        let count = {
            let mut state = self.state.lock();
            let count = state.tracked.len();
            state.tracked.clear();
            state.baselines.clear();
            state.cooldowns.clear();
            count
        };
        self.persist();
        if count > 0 {
            self.events
                .append("", EventKind::RemovedAll, format!("removed {count} extensions"));
        }
        count
    }

    /// Import an explicit extension list, optionally capturing the current
    /// effective handler as baseline right away. An empty or all-invalid
    /// selection is an error and mutates nothing.
    pub fn import_extensions(&self, exts: &[String], capture_now: bool) -> Result<ImportSummary> {
        let mut invalid = 0;
        let mut cleaned: Vec<String> = Vec::new();
        for raw in exts {
            let key = normalize_ext(raw);
            if !is_valid_ext(&key) {
                invalid += 1;
                continue;
            }
            if !cleaned.contains(&key) {
                cleaned.push(key);
            }
        }
        if cleaned.is_empty() {
            bail!("nothing to import");
        }

        let added = {
            let mut state = self.state.lock();
            let before = state.tracked.len();
            for key in &cleaned {
                state.tracked.insert(key.clone());
            }
            state.tracked.len() - before
        };

        let mut captured = 0;
        if capture_now {
            captured = self.capture_baselines(&cleaned);
        }

        self.persist();
        for key in &cleaned {
            self.events.append(key, EventKind::ExtensionImported, "");
        }
        let summary = ImportSummary {
            selected: cleaned.len(),
            added,
            captured,
            invalid,
        };
        self.notify(&format!(
            "Imported {} extension(s), captured {} baseline(s)",
            summary.selected, summary.captured
        ));
        Ok(summary)
    }

    /// One-click setup: enumerate extensions whose per-user default was
    /// explicitly chosen at least once, track them, and capture baselines.
    pub fn import_current_defaults(&self) -> Result<DefaultsImportSummary> {
        let found: Vec<String> = self
            .registry
            .user_choice_extensions()
            .into_iter()
            .map(|raw| normalize_ext(&raw))
            .filter(|key| is_valid_ext(key))
            .collect();
        if found.is_empty() {
            bail!("no per-user defaults found to import");
        }

        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut skipped = 0;
        for ext in &found {
            match resolver::effective_progid(&*self.registry, ext) {
                Some(progid) if resolver::progid_exists(&*self.registry, &progid) => {
                    pairs.push((ext.clone(), progid));
                }
                _ => skipped += 1,
            }
        }
        if pairs.is_empty() {
            bail!("none of the {} discovered defaults resolve to a valid handler", found.len());
        }

        let added = {
            let mut state = self.state.lock();
            let before = state.tracked.len();
            for (ext, progid) in &pairs {
                state.tracked.insert(ext.clone());
                state.baselines.insert(ext.clone(), progid.clone());
            }
            state.tracked.len() - before
        };

        self.persist();
        let summary = DefaultsImportSummary {
            found: found.len(),
            imported: pairs.len(),
            added,
            skipped,
        };
        self.events.append(
            "",
            EventKind::DefaultsImported,
            format!(
                "found {}, imported {}, added {}, skipped {}",
                summary.found, summary.imported, summary.added, summary.skipped
            ),
        );
        self.notify(&format!(
            "Imported {} current default(s)",
            summary.imported
        ));
        Ok(summary)
    }

    // ── baseline actions ────────────────────────────────────────────────

    /// Capture the current effective handler as baseline for each given
    /// tracked extension. Returns how many were captured.
    pub fn capture_baselines(&self, exts: &[String]) -> usize {
        let mut captured = 0;
        for raw in exts {
            let key = normalize_ext(raw);
            if key.is_empty() {
                continue;
            }
            let Some(progid) = resolver::effective_progid(&*self.registry, &key) else {
                continue;
            };
            if !resolver::progid_exists(&*self.registry, &progid) {
                continue;
            }
            let mut state = self.state.lock();
            if state.tracked.contains(&key) {
                state.baselines.insert(key.clone(), progid.clone());
                captured += 1;
                drop(state);
                self.events
                    .append(&key, EventKind::BaselineCaptured, progid);
            }
        }
        self.persist();
        if captured > 0 {
            self.notify(&format!("Captured {captured} baseline(s)"));
        }
        captured
    }

    pub fn capture_all(&self) -> usize {
        let tracked = self.snapshot().tracked;
        self.capture_baselines(&tracked)
    }

    /// Manual baseline edit for one extension. An empty handler id clears
    /// the baseline; a non-empty one must name an existing registration.
    pub fn set_baseline(&self, ext: &str, progid_raw: &str) -> Result<BaselineChange> {
        let key = normalize_ext(ext);
        if !is_valid_ext(&key) {
            bail!("invalid extension: {ext:?}");
        }
        let progid = progid_raw.trim();

        if progid.is_empty() {
            self.state.lock().baselines.remove(&key);
            self.persist();
            self.events.append(&key, EventKind::BaselineCleared, "");
            return Ok(BaselineChange::Cleared);
        }

        if !resolver::progid_exists(&*self.registry, progid) {
            bail!("no handler registration exists for {progid:?}");
        }
        {
            let mut state = self.state.lock();
            if !state.tracked.contains(&key) {
                bail!("{key} is not a tracked extension");
            }
            state.baselines.insert(key.clone(), progid.to_string());
        }
        self.persist();
        self.events.append(
            &key,
            EventKind::BaselineSet,
            resolver::display_label(&*self.registry, progid),
        );
        Ok(BaselineChange::Set)
    }

    // ── manual restore ──────────────────────────────────────────────────

    /// Restore the given extensions to their baselines now, ignoring
    /// cooldowns (manual action).
    pub fn restore_extensions(&self, exts: &[String]) -> RestoreSummary {
        let baselines = self.snapshot().baselines;
        let mut summary = RestoreSummary::default();
        for raw in exts {
            let key = normalize_ext(raw);
            let Some(baseline) = baselines.get(&key) else {
                continue;
            };
            summary.processed += 1;
            let outcome = restore::restore_to_baseline(&*self.registry, &key, baseline);
            self.record_restore_outcome(&outcome, false);
            if outcome.ok {
                summary.succeeded += 1;
            }
        }
        if summary.processed > 0 {
            self.notify(&format!(
                "Restored {} of {} extension(s)",
                summary.succeeded, summary.processed
            ));
        }
        summary
    }

    pub fn restore_all(&self) -> RestoreSummary {
        let tracked: Vec<String> = self.snapshot().baselines.keys().cloned().collect();
        self.restore_extensions(&tracked)
    }

    pub(crate) fn record_restore_outcome(&self, outcome: &RestoreOutcome, auto: bool) {
        let kind = match (auto, outcome.ok) {
            (false, true) => EventKind::RestoreSucceeded,
            (false, false) => EventKind::RestoreFailed,
            (true, true) => EventKind::AutoRestoreSucceeded,
            (true, false) => EventKind::AutoRestoreFailed,
        };
        let detail = if outcome.ok {
            format!(
                "{} -> {}",
                outcome.previous_progid.as_deref().unwrap_or("-"),
                outcome.baseline_progid
            )
        } else {
            outcome
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default()
        };
        self.events.append(&outcome.ext, kind, detail);
    }

    // ── settings ────────────────────────────────────────────────────────

    pub fn update_settings(&self, view: SettingsView) -> SettingsView {
        let interval = clamp_interval_secs(view.monitor_interval_secs);
        {
            let mut state = self.state.lock();
            state.interval_secs = interval;
            state.notifications_enabled = view.notifications_enabled;
            state.auto_restore_enabled = view.auto_restore_enabled;
        }

        // Startup registration is registry state, toggled outside the lock;
        // the flag is then re-read from the machine rather than assumed.
        let command = view.auto_start_enabled.then(startup_command_line).flatten();
        if let Err(err) = self.registry.set_startup_command(command.as_deref()) {
            warn!(error = %err, "startup registration toggle failed");
        }
        let actual_auto_start = self.registry.startup_command().is_some();
        self.state.lock().auto_start_enabled = actual_auto_start;

        self.persist();
        self.events.append(
            "",
            EventKind::SettingsUpdated,
            format!(
                "interval {interval}s, notifications {}, auto-restore {}, start with system {}",
                onoff(view.notifications_enabled),
                onoff(view.auto_restore_enabled),
                onoff(actual_auto_start),
            ),
        );
        self.settings()
    }

    // ── plumbing ────────────────────────────────────────────────────────

    pub fn to_config(&self) -> GuardConfig {
        self.state.lock().to_config()
    }

    /// Best-effort save after a mutation; never fatal.
    pub(crate) fn persist(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        let cfg = self.to_config();
        if let Err(err) = storage::save_config(path, &cfg) {
            warn!(path = %path.display(), error = %err, "config save failed");
        }
    }

    /// Emit a notification unless the user turned them off.
    pub(crate) fn notify(&self, message: &str) {
        if !self.state.lock().notifications_enabled {
            return;
        }
        self.notifier.notify(NOTIFY_TITLE, message);
    }
}

fn onoff(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn startup_command_line() -> Option<String> {
    std::env::current_exe()
        .ok()
        .map(|exe| format!("\"{}\" run", exe.display()))
}
