use crate::ext::{is_valid_ext, normalize_ext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_INTERVAL_SECS: u64 = 1;
pub const MAX_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_INTERVAL_SECS: u64 = 3;

/// Clamp a poll interval into the supported range. Out-of-range values are
/// silently clamped, never rejected.
pub fn clamp_interval_secs(value: u64) -> u64 {
    value.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
}

/// The persisted configuration document. The engine consumes and produces
/// this in-memory; [`crate::storage`] owns the file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub tracked_exts: Vec<String>,
    /// Baseline handler id per extension ("the app the user wants").
    #[serde(default)]
    pub baselines: BTreeMap<String, String>,
    #[serde(default = "default_interval")]
    pub monitor_interval_secs: u64,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub auto_restore_enabled: bool,
    #[serde(default)]
    pub auto_start_enabled: bool,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_true() -> bool {
    true
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            tracked_exts: Vec::new(),
            baselines: BTreeMap::new(),
            monitor_interval_secs: DEFAULT_INTERVAL_SECS,
            notifications_enabled: true,
            auto_restore_enabled: true,
            auto_start_enabled: false,
        }
    }
}

impl GuardConfig {
    /// Normalize every extension, drop the invalid ones, drop baselines whose
    /// extension is not tracked or whose handler id is empty, and clamp the
    /// interval. Hand-edited or stale config files go through this on load so
    /// a bad entry can never reach the guard state.
    pub fn sanitized(self) -> Self {
        let mut tracked: Vec<String> = Vec::new();
        for raw in &self.tracked_exts {
            let key = normalize_ext(raw);
            if is_valid_ext(&key) && !tracked.contains(&key) {
                tracked.push(key);
            }
        }
        tracked.sort();

        let mut baselines = BTreeMap::new();
        for (raw, progid) in &self.baselines {
            let key = normalize_ext(raw);
            let progid = progid.trim();
            if tracked.contains(&key) && !progid.is_empty() {
                baselines.insert(key, progid.to_string());
            }
        }

        Self {
            tracked_exts: tracked,
            baselines,
            monitor_interval_secs: clamp_interval_secs(self.monitor_interval_secs),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped_not_rejected() {
        assert_eq!(clamp_interval_secs(0), 1);
        assert_eq!(clamp_interval_secs(3), 3);
        assert_eq!(clamp_interval_secs(500), 60);
    }

    #[test]
    fn sanitize_drops_invalid_exts_and_orphan_baselines() {
        let cfg = GuardConfig {
            tracked_exts: vec![
                "PDF".into(),
                ".txt".into(),
                "not an ext!".into(),
                ".pdf".into(),
            ],
            baselines: [
                (".pdf".to_string(), "AppX.Document".to_string()),
                (".doc".to_string(), "Orphan.Handler".to_string()),
                (".txt".to_string(), "   ".to_string()),
            ]
            .into(),
            monitor_interval_secs: 999,
            ..GuardConfig::default()
        };

        let clean = cfg.sanitized();
        assert_eq!(clean.tracked_exts, vec![".pdf".to_string(), ".txt".to_string()]);
        assert_eq!(clean.baselines.len(), 1);
        assert_eq!(clean.baselines[".pdf"], "AppX.Document");
        assert_eq!(clean.monitor_interval_secs, 60);
    }
}
