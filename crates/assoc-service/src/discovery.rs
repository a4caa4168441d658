//! Candidate handler discovery for the picker.
//!
//! Collects plausible handler ids from the OS-maintained indices, in an order
//! that puts today's reality first so the picker defaults near the current
//! behavior. Deduplicated, existence-filtered, order-preserving by first
//! discovery, capped at `limit`.

use crate::registry::{application_progid, AssocRegistry, Scope};
use crate::resolver;
use assoc_core::ext::{is_valid_ext, normalize_ext};
use std::collections::HashSet;

pub const DEFAULT_CANDIDATE_LIMIT: usize = 24;

pub fn candidate_progids(store: &dyn AssocRegistry, ext: &str, limit: usize) -> Vec<String> {
    let key = normalize_ext(ext);
    if !is_valid_ext(&key) {
        return Vec::new();
    }
    let limit = limit.max(1);

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    let mut add = |out: &mut Vec<String>, seen: &mut HashSet<String>, candidate: &str| {
        let candidate = candidate.trim();
        if candidate.is_empty() || seen.contains(candidate) {
            return;
        }
        // Keep only resolvable handler ids.
        if !resolver::progid_exists(store, candidate) {
            return;
        }
        seen.insert(candidate.to_string());
        out.push(candidate.to_string());
    };

    // Current effective chain first.
    for tier in [
        store.user_choice_progid(&key),
        store.user_class_progid(&key),
        store.machine_class_progid(&key),
    ]
    .into_iter()
    .flatten()
    {
        add(&mut out, &mut seen, &tier);
    }

    // "Open with" recently-used indices, per-user then machine.
    for scope in [Scope::User, Scope::Machine] {
        for progid in store.open_with_progids(&key, scope) {
            add(&mut out, &mut seen, &progid);
        }
    }

    // OpenWithList stores executable names; map them into the application
    // namespace.
    for scope in [Scope::User, Scope::Machine] {
        for exe in store.open_with_list(&key, scope) {
            add(&mut out, &mut seen, &application_progid(&exe));
        }
    }

    // Full application-registry scan only when the cheaper sources left room.
    if out.len() < limit {
        for app in store.registered_applications() {
            if out.len() >= limit {
                break;
            }
            if store.application_supports_ext(&app, &key) {
                add(&mut out, &mut seen, &application_progid(&app));
            }
        }
    }

    out.truncate(limit);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::MemoryRegistry;

    fn seeded() -> MemoryRegistry {
        let reg = MemoryRegistry::new();
        for progid in ["Current.Override", "User.Class", "Machine.Class", "Mru.One"] {
            reg.register_progid(progid);
        }
        reg.set_user_choice(".pdf", "Current.Override");
        reg.set_user_class(".pdf", "User.Class");
        reg.set_machine_class(".pdf", "Machine.Class");
        reg.add_open_with_progid(Scope::User, ".pdf", "Mru.One");
        reg.add_open_with_exe(Scope::Machine, ".pdf", "viewer.exe");
        reg.register_application("viewer.exe", &[".pdf"]);
        reg
    }

    #[test]
    fn current_reality_ranks_first() {
        let reg = seeded();
        let found = candidate_progids(&reg, ".pdf", DEFAULT_CANDIDATE_LIMIT);
        assert_eq!(
            found,
            vec![
                "Current.Override".to_string(),
                "User.Class".to_string(),
                "Machine.Class".to_string(),
                "Mru.One".to_string(),
                r"Applications\viewer.exe".to_string(),
            ]
        );
    }

    #[test]
    fn unregistered_ids_are_filtered_and_duplicates_collapse() {
        let reg = seeded();
        // Same id in two indices, plus one that resolves nowhere.
        reg.add_open_with_progid(Scope::Machine, ".pdf", "Mru.One");
        reg.add_open_with_progid(Scope::Machine, ".pdf", "Ghost.Handler");
        let found = candidate_progids(&reg, ".pdf", DEFAULT_CANDIDATE_LIMIT);
        assert_eq!(
            found.iter().filter(|p| p.as_str() == "Mru.One").count(),
            1
        );
        assert!(!found.iter().any(|p| p == "Ghost.Handler"));
    }

    #[test]
    fn limit_caps_and_skips_application_scan() {
        let reg = MemoryRegistry::new();
        for i in 0..10 {
            let id = format!("Handler.{i}");
            reg.register_progid(&id);
            reg.add_open_with_progid(Scope::User, ".txt", &id);
        }
        // Would match the scan, but the cap is already satisfied.
        reg.register_application("late.exe", &[".txt"]);

        let found = candidate_progids(&reg, ".txt", 4);
        assert_eq!(found.len(), 4);
        assert!(!found.iter().any(|p| p.contains("late.exe")));
    }

    #[test]
    fn invalid_extension_yields_nothing() {
        let reg = seeded();
        assert!(candidate_progids(&reg, "", DEFAULT_CANDIDATE_LIMIT).is_empty());
        assert!(candidate_progids(&reg, "not an ext", DEFAULT_CANDIDATE_LIMIT).is_empty());
    }
}
