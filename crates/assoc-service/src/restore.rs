//! Restore-to-baseline protocol.
//!
//! The topmost override tier is not writable without a hash the engine does
//! not possess, so the protocol is best effort and explicitly non-atomic:
//!
//! 1. Read the current effective handler (for the outcome only).
//! 2. Write the per-user class default to the baseline id.
//! 3. Delete the per-user override so resolution falls through to step 2.
//! 4. Broadcast the association change to running shell components.
//! 5. Re-resolve and compare.
//!
//! An effective handler that resolves to *absent* right after the change is
//! treated as success. That is a heuristic: the shell may need a moment to
//! re-populate, and treating it as failure would mark every restore on such
//! systems as broken. It can mask a genuine post-write failure.
//!
//! The protocol always returns a structured outcome, never an error.

use crate::registry::AssocRegistry;
use crate::resolver;
use assoc_core::ext::{is_valid_ext, normalize_ext};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    #[error("invalid arguments")]
    InvalidArguments,
    #[error("effective handler differs from baseline after restore")]
    MismatchAfterRestore,
    #[error("{0}")]
    Os(String),
}

/// Result of one restore attempt. Ephemeral: produced per attempt, consumed
/// by logging and notification, never persisted.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub ext: String,
    pub ok: bool,
    pub error: Option<RestoreError>,
    /// Effective handler before the attempt, when it resolved at all.
    pub previous_progid: Option<String>,
    pub baseline_progid: String,
}

impl RestoreOutcome {
    fn failure(
        ext: String,
        baseline: String,
        previous: Option<String>,
        error: RestoreError,
    ) -> Self {
        Self {
            ext,
            ok: false,
            error: Some(error),
            previous_progid: previous,
            baseline_progid: baseline,
        }
    }
}

/// Force the effective handler for `ext` back to `baseline`. Does not
/// pre-validate the baseline id; callers that want validation do it first.
pub fn restore_to_baseline(store: &dyn AssocRegistry, ext: &str, baseline: &str) -> RestoreOutcome {
    let key = normalize_ext(ext);
    let baseline = baseline.trim().to_string();

    // Read-before-write, for the outcome's "previous" field only.
    let previous = if key.is_empty() {
        None
    } else {
        resolver::effective_progid(store, &key)
    };

    if !is_valid_ext(&key) || baseline.is_empty() {
        return RestoreOutcome::failure(key, baseline, previous, RestoreError::InvalidArguments);
    }

    if let Err(err) = store.set_user_class_default(&key, &baseline) {
        warn!(ext = %key, error = %err, "writing per-user class default failed");
        return RestoreOutcome::failure(key, baseline, previous, RestoreError::Os(err.to_string()));
    }
    if let Err(err) = store.delete_user_choice(&key) {
        warn!(ext = %key, error = %err, "deleting override record failed");
        return RestoreOutcome::failure(key, baseline, previous, RestoreError::Os(err.to_string()));
    }
    store.broadcast_assoc_changed();

    let now_effective = resolver::effective_progid(store, &key);
    let ok = match now_effective.as_deref() {
        Some(current) => current == baseline,
        // Transiently absent right after the change; counted as success.
        None => true,
    };
    if ok {
        info!(ext = %key, baseline = %baseline, previous = ?previous, "association restored");
        RestoreOutcome {
            ext: key,
            ok: true,
            error: None,
            previous_progid: previous,
            baseline_progid: baseline,
        }
    } else {
        warn!(
            ext = %key,
            baseline = %baseline,
            effective = ?now_effective,
            "effective handler still differs after restore"
        );
        RestoreOutcome::failure(key, baseline, previous, RestoreError::MismatchAfterRestore)
    }
}
