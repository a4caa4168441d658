use assoc_core::event_log::EventKind;
use assoc_core::settings::GuardConfig;
use assoc_core::storage;
use assoc_service::engine::{BaselineChange, GuardEngine};
use assoc_service::notify::Notifier;
use assoc_service::registry::memory::MemoryRegistry;
use assoc_service::registry::AssocRegistry;
use parking_lot::Mutex;
use std::sync::Arc;

struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.messages.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _title: &str, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

fn engine_with(reg: Arc<MemoryRegistry>, cfg: GuardConfig) -> GuardEngine {
    GuardEngine::from_config(reg, RecordingNotifier::new(), cfg, None)
}

fn fresh_engine(reg: Arc<MemoryRegistry>) -> GuardEngine {
    engine_with(reg, GuardConfig::default())
}

// ── tracked set ─────────────────────────────────────────────────────────

#[test]
fn add_normalizes_and_reports_newness() {
    let reg = Arc::new(MemoryRegistry::new());
    let engine = fresh_engine(reg);

    assert!(engine.add_extension("PDF").unwrap());
    assert!(!engine.add_extension(".pdf").unwrap());
    assert_eq!(engine.snapshot().tracked, vec![".pdf".to_string()]);
}

#[test]
fn add_rejects_invalid_extensions() {
    let reg = Arc::new(MemoryRegistry::new());
    let engine = fresh_engine(reg);

    assert!(engine.add_extension("not an ext!").is_err());
    assert!(engine.add_extension("").is_err());
    assert!(engine.snapshot().tracked.is_empty());
}

#[test]
fn removal_never_leaves_an_orphan_baseline() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    reg.set_user_class(".pdf", "AppX.Document");
    let engine = fresh_engine(reg);

    engine.add_extension(".pdf").unwrap();
    engine.capture_baselines(&[".pdf".to_string()]);
    assert_eq!(engine.baseline(".pdf").as_deref(), Some("AppX.Document"));

    let removed = engine.remove_extensions(&[".pdf".to_string()]);
    assert_eq!(removed, vec![".pdf".to_string()]);
    assert_eq!(engine.baseline(".pdf"), None);
    assert!(engine.to_config().baselines.is_empty());
}

#[test]
fn remove_all_clears_everything() {
    let reg = Arc::new(MemoryRegistry::new());
    let engine = fresh_engine(reg);
    engine.add_extension(".pdf").unwrap();
    engine.add_extension(".txt").unwrap();

    assert_eq!(engine.remove_all(), 2);
    assert!(engine.snapshot().tracked.is_empty());
    assert_eq!(engine.remove_all(), 0);
}

// ── import ──────────────────────────────────────────────────────────────

#[test]
fn import_of_nothing_usable_is_an_error() {
    let reg = Arc::new(MemoryRegistry::new());
    let engine = fresh_engine(reg);

    assert!(engine.import_extensions(&[], true).is_err());
    let garbage = vec!["!!".to_string(), "".to_string()];
    assert!(engine.import_extensions(&garbage, true).is_err());
    assert!(engine.snapshot().tracked.is_empty());
}

#[test]
fn import_with_capture_tracks_and_baselines() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    reg.set_user_class(".pdf", "AppX.Document");
    let engine = fresh_engine(reg);
    engine.add_extension(".txt").unwrap();

    let selection = vec![
        "PDF".to_string(),
        ".txt".to_string(),
        "bogus ext".to_string(),
    ];
    let summary = engine.import_extensions(&selection, true).unwrap();
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.added, 1); // .txt was already tracked
    assert_eq!(summary.invalid, 1);
    assert_eq!(summary.captured, 1); // only .pdf resolves to a handler
    assert_eq!(engine.baseline(".pdf").as_deref(), Some("AppX.Document"));
    assert_eq!(engine.baseline(".txt"), None);
}

#[test]
fn import_current_defaults_skips_dangling_handlers() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    reg.set_user_choice(".pdf", "AppX.Document");
    // .xyz points at a handler with no registration behind it
    reg.set_user_choice(".xyz", "Gone.Handler");
    let engine = fresh_engine(reg);

    let summary = engine.import_current_defaults().unwrap();
    assert_eq!(summary.found, 2);
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(engine.baseline(".pdf").as_deref(), Some("AppX.Document"));
    assert!(!engine.snapshot().tracked.contains(&".xyz".to_string()));
}

#[test]
fn import_current_defaults_with_none_found_is_an_error() {
    let reg = Arc::new(MemoryRegistry::new());
    let engine = fresh_engine(reg);
    assert!(engine.import_current_defaults().is_err());
}

// ── baselines ───────────────────────────────────────────────────────────

#[test]
fn capture_all_covers_only_resolvable_tracked_extensions() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    reg.set_machine_class(".pdf", "AppX.Document");
    let engine = fresh_engine(reg);
    engine.add_extension(".pdf").unwrap();
    engine.add_extension(".txt").unwrap(); // resolves to nothing

    assert_eq!(engine.capture_all(), 1);
    assert_eq!(engine.baseline(".pdf").as_deref(), Some("AppX.Document"));
    assert_eq!(engine.baseline(".txt"), None);
}

#[test]
fn set_baseline_validates_handler_and_tracking() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    let engine = fresh_engine(reg);
    engine.add_extension(".pdf").unwrap();

    assert!(engine.set_baseline(".pdf", "NoSuch.Handler").is_err());
    assert!(engine.set_baseline(".txt", "AppX.Document").is_err());

    let change = engine.set_baseline(".pdf", "AppX.Document").unwrap();
    assert_eq!(change, BaselineChange::Set);
    assert_eq!(engine.baseline(".pdf").as_deref(), Some("AppX.Document"));

    let change = engine.set_baseline(".pdf", "  ").unwrap();
    assert_eq!(change, BaselineChange::Cleared);
    assert_eq!(engine.baseline(".pdf"), None);
}

#[test]
fn saved_baseline_leads_the_candidate_list_even_when_unlisted() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    reg.register_progid("Old.Handler");
    reg.set_user_class(".pdf", "AppX.Document");
    let engine = fresh_engine(reg.clone());
    engine.add_extension(".pdf").unwrap();
    engine.set_baseline(".pdf", "Old.Handler").unwrap();

    let candidates = engine.baseline_candidates(".pdf");
    assert_eq!(candidates[0].0, "Old.Handler");
    assert!(candidates.iter().any(|(id, _)| id == "AppX.Document"));
}

// ── status ──────────────────────────────────────────────────────────────

#[test]
fn status_rows_cover_all_three_states() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    reg.register_progid("Text.Handler");
    reg.set_user_class(".pdf", "AppX.Document");
    reg.set_user_class(".txt", "Text.Handler");
    let engine = fresh_engine(reg.clone());
    for ext in [".pdf", ".txt", ".zip"] {
        engine.add_extension(ext).unwrap();
    }
    engine.capture_all();
    // .zip captured nothing; hijack .txt afterwards
    reg.set_user_choice(".txt", "Hijack.Handler");

    let rows = engine.status_rows();
    let status_of = |ext: &str| {
        rows.iter()
            .find(|row| row.ext == ext)
            .map(|row| row.status.label())
            .unwrap()
    };
    assert_eq!(status_of(".pdf"), "in sync");
    assert_eq!(status_of(".txt"), "drifted");
    assert_eq!(status_of(".zip"), "no baseline");
}

// ── manual restore ──────────────────────────────────────────────────────

#[test]
fn restore_all_reports_processed_and_succeeded() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    reg.register_progid("Text.Handler");
    reg.set_user_class(".pdf", "AppX.Document");
    reg.set_user_class(".txt", "Text.Handler");
    let engine = fresh_engine(reg.clone());
    engine.add_extension(".pdf").unwrap();
    engine.add_extension(".txt").unwrap();
    engine.capture_all();
    reg.set_user_choice(".pdf", "Hijack.Handler");
    reg.set_user_choice(".txt", "Hijack.Handler");
    reg.set_sticky_user_choice(true); // .txt and .pdf both stay hijacked

    let summary = engine.restore_all();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.succeeded, 0);

    reg.set_sticky_user_choice(false);
    let summary = engine.restore_all();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(reg.user_choice_progid(".pdf"), None);
}

#[test]
fn restore_with_no_matching_baselines_stays_silent() {
    let reg = Arc::new(MemoryRegistry::new());
    let notifier = RecordingNotifier::new();
    let engine =
        GuardEngine::from_config(reg, notifier.clone(), GuardConfig::default(), None);
    engine.add_extension(".pdf").unwrap();
    let adds = notifier.count();

    // Tracked but no baseline: nothing to process, nothing to announce.
    let summary = engine.restore_extensions(&[".pdf".to_string()]);
    assert_eq!(summary.processed, 0);
    assert_eq!(notifier.count(), adds);
}

// ── settings ────────────────────────────────────────────────────────────

#[test]
fn update_settings_clamps_and_toggles_startup() {
    let reg = Arc::new(MemoryRegistry::new());
    let engine = fresh_engine(reg.clone());

    let mut view = engine.settings();
    assert!(!view.auto_start_enabled);
    view.monitor_interval_secs = 500;
    view.auto_start_enabled = true;
    let applied = engine.update_settings(view);
    assert_eq!(applied.monitor_interval_secs, 60);
    assert!(applied.auto_start_enabled);
    assert!(reg.startup_command().is_some());

    view = applied;
    view.auto_start_enabled = false;
    let applied = engine.update_settings(view);
    assert!(!applied.auto_start_enabled);
    assert_eq!(reg.startup_command(), None);
}

#[test]
fn startup_registration_on_the_machine_wins_over_the_config() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.set_startup_command(Some("\"C:\\guard.exe\" run")).unwrap();
    let cfg = GuardConfig {
        auto_start_enabled: false,
        ..GuardConfig::default()
    };
    let engine = engine_with(reg, cfg);
    assert!(engine.settings().auto_start_enabled);
}

// ── event log and notifications ─────────────────────────────────────────

#[test]
fn actions_append_filterable_events() {
    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    let engine = fresh_engine(reg);
    engine.add_extension(".pdf").unwrap();
    engine.add_extension(".txt").unwrap();
    engine.set_baseline(".pdf", "AppX.Document").unwrap();

    let all = engine.log_rows(None, 200);
    assert_eq!(all.len(), 3);
    // newest first
    assert_eq!(all[0].kind, EventKind::BaselineSet);

    let pdf_only = engine.log_rows(Some("PDF"), 200);
    assert_eq!(pdf_only.len(), 2);
    assert!(pdf_only.iter().all(|entry| entry.ext == ".pdf"));
}

#[test]
fn disabled_notifications_are_suppressed() {
    let reg = Arc::new(MemoryRegistry::new());
    let notifier = RecordingNotifier::new();
    let cfg = GuardConfig {
        notifications_enabled: false,
        ..GuardConfig::default()
    };
    let engine = GuardEngine::from_config(reg, notifier.clone(), cfg, None);

    engine.add_extension(".pdf").unwrap();
    assert_eq!(notifier.count(), 0);
}

// ── persistence ─────────────────────────────────────────────────────────

#[test]
fn state_survives_a_save_load_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let reg = Arc::new(MemoryRegistry::new());
    reg.register_progid("AppX.Document");
    reg.set_user_class(".pdf", "AppX.Document");
    let engine = GuardEngine::from_config(
        reg.clone(),
        RecordingNotifier::new(),
        GuardConfig::default(),
        Some(path.clone()),
    );
    engine.add_extension(".pdf").unwrap();
    engine.capture_all();
    let mut view = engine.settings();
    view.monitor_interval_secs = 7;
    engine.update_settings(view);

    let reloaded = GuardEngine::from_config(
        reg,
        RecordingNotifier::new(),
        storage::load_config(&path),
        Some(path),
    );
    assert_eq!(reloaded.snapshot().tracked, vec![".pdf".to_string()]);
    assert_eq!(reloaded.baseline(".pdf").as_deref(), Some("AppX.Document"));
    assert_eq!(reloaded.settings().monitor_interval_secs, 7);
}
