//! Config persistence in a human-readable JSON file.
//!
//! A corrupt or missing file loads defaults instead of failing: the guard
//! keeps running on whatever state it can get, it never refuses to start
//! because the config rotted.

use crate::settings::GuardConfig;
use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::warn;

pub fn load_config(path: &Path) -> GuardConfig {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return GuardConfig::default();
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "config unreadable, using defaults");
            return GuardConfig::default();
        }
    };
    match serde_json::from_str::<GuardConfig>(&text) {
        Ok(cfg) => cfg.sanitized(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "config corrupted, using defaults");
            GuardConfig::default()
        }
    }
}

pub fn save_config(path: &Path, cfg: &GuardConfig) -> anyhow::Result<()> {
    let payload = serde_json::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir {}", parent.display()))?;
    }
    fs::write(path, payload).with_context(|| format!("write config {}", path.display()))?;
    Ok(())
}
