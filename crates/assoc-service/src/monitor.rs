//! Background drift monitor.
//!
//! One perpetual tokio task: snapshot the guard state, resolve every tracked
//! extension, restore the drifted ones, report in batches, sleep, repeat.
//! Sleeps run in sub-second slices so a shutdown signal is observed within
//! roughly one slice instead of a full interval.
//!
//! The per-extension cooldown is fixed and independent of the poll interval,
//! and is stamped before the write: a slow or failing attempt cannot be
//! retried on the very next tick.

use crate::engine::GuardEngine;
use crate::notify::format_ext_list;
use crate::resolver;
use crate::restore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Minimum seconds between two correction attempts for one extension.
pub const RESTORE_COOLDOWN_SECS: i64 = 12;

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Outcome buckets of one scan, batched into at most one success and one
/// failure notification.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub restored: Vec<String>,
    pub failed: Vec<String>,
}

impl GuardEngine {
    /// One monitor scan at time `now`. Public so tests can drive the clock.
    pub fn auto_restore_tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let snapshot = self.snapshot();
        if !snapshot.auto_restore_enabled {
            return report;
        }

        for (ext, baseline) in &snapshot.baselines {
            if baseline.is_empty() {
                continue;
            }
            if !self.cooldown_elapsed(ext, now) {
                continue;
            }
            let current = resolver::effective_progid(&*self.registry, ext);
            if current.as_deref() == Some(baseline.as_str()) {
                continue;
            }

            debug!(ext = %ext, baseline = %baseline, current = ?current, "drift detected");
            self.stamp_cooldown(ext, now);
            let outcome = restore::restore_to_baseline(&*self.registry, ext, baseline);
            self.record_restore_outcome(&outcome, true);
            if outcome.ok {
                report.restored.push(ext.clone());
            } else {
                report.failed.push(ext.clone());
            }
        }
        report
    }

    fn cooldown_elapsed(&self, ext: &str, now: DateTime<Utc>) -> bool {
        let state = self.state.lock();
        match state.cooldowns.get(ext) {
            Some(last) => (now - *last).num_seconds() >= RESTORE_COOLDOWN_SECS,
            None => true,
        }
    }

    fn stamp_cooldown(&self, ext: &str, now: DateTime<Utc>) {
        self.state.lock().cooldowns.insert(ext.to_string(), now);
    }

    /// Report one scan's outcomes: at most one batched success and at most
    /// one batched failure notification, never one per extension.
    pub fn notify_tick_outcomes(&self, report: &TickReport) {
        if !report.restored.is_empty() {
            self.notify(&format!(
                "Restored default app for {}",
                format_ext_list(&report.restored)
            ));
        }
        if !report.failed.is_empty() {
            self.notify(&format!(
                "Could not restore default app for {}",
                format_ext_list(&report.failed)
            ));
        }
    }
}

/// Handle returned to the caller so it can shut the loop down.
pub struct MonitorHandle {
    pub shutdown_tx: watch::Sender<bool>,
}

/// Spawn the monitor as a tokio task.
pub fn spawn_monitor(engine: Arc<GuardEngine>) -> (tokio::task::JoinHandle<()>, MonitorHandle) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor_loop(engine, shutdown_rx));
    (handle, MonitorHandle { shutdown_tx })
}

async fn monitor_loop(engine: Arc<GuardEngine>, mut shutdown_rx: watch::Receiver<bool>) {
    info!("monitor loop started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let snapshot = engine.snapshot();
        if snapshot.auto_restore_enabled {
            let report = engine.auto_restore_tick(Utc::now());
            engine.notify_tick_outcomes(&report);
        }

        if sleep_sliced(snapshot.interval, &mut shutdown_rx).await {
            break;
        }
    }
    info!("monitor loop shutting down");
}

/// Sleep `total` in small slices, returning `true` as soon as shutdown is
/// requested.
async fn sleep_sliced(total: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        let step = remaining.min(SLEEP_SLICE);
        tokio::select! {
            _ = tokio::time::sleep(step) => {}
            _ = shutdown_rx.changed() => {}
        }
        if *shutdown_rx.borrow() {
            return true;
        }
        remaining = remaining.saturating_sub(step);
    }
    *shutdown_rx.borrow()
}
