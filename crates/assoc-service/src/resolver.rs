//! Association resolution and handler labels.
//!
//! The effective handler for an extension is resolved the way the shell does
//! it: the per-user UserChoice override shadows the per-user class default,
//! which shadows the machine-wide one. Getting this order wrong makes drift
//! detection unreliable, so it is the one invariant this module guards.

use crate::registry::AssocRegistry;
use assoc_core::ext::normalize_ext;

/// Basename of a launch-command path, parsed host-independently: registry
/// command lines use Windows separators regardless of the host platform.
fn basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// Effective handler id for an extension: UserChoice, then the per-user class
/// default, then the machine class default. First non-empty hit wins; a tier
/// holding an empty value does not shadow the tiers below it.
pub fn effective_progid(store: &dyn AssocRegistry, ext: &str) -> Option<String> {
    let key = normalize_ext(ext);
    if key.is_empty() {
        return None;
    }
    present(store.user_choice_progid(&key))
        .or_else(|| present(store.user_class_progid(&key)))
        .or_else(|| present(store.machine_class_progid(&key)))
}

fn present(progid: Option<String>) -> Option<String> {
    progid.filter(|p| !p.trim().is_empty())
}

/// A handler id is valid iff a registration for it exists. Existence, not
/// semantic correctness, is the contract.
pub fn progid_exists(store: &dyn AssocRegistry, progid: &str) -> bool {
    let progid = progid.trim();
    !progid.is_empty() && store.progid_exists(progid)
}

/// Human-readable label for a handler id, best effort. Worst case the raw id
/// comes back, so the result is non-empty whenever the input is.
pub fn display_name(store: &dyn AssocRegistry, progid: &str) -> String {
    let progid = progid.trim();
    if progid.is_empty() {
        return String::new();
    }

    if let Some(label) = store.class_default_label(progid) {
        // Labels can be indirections into a resource dll.
        if label.starts_with('@') {
            if let Some(resolved) = store.resolve_indirect_string(&label) {
                return resolved;
            }
        }
        return label;
    }

    // The shell resolves modern app registrations better than raw key reads.
    if let Some(name) = store.shell_friendly_app_name(progid) {
        return name;
    }

    if let Some(name) = store.friendly_type_name(progid) {
        return name;
    }

    if let Some(command) = store.open_command(progid) {
        if let Some(exe) = exe_from_command(&command) {
            return exe;
        }
    }

    progid.to_string()
}

/// Best-effort application name for a handler id; empty when nothing better
/// than the raw id is known.
pub fn app_name(store: &dyn AssocRegistry, progid: &str) -> String {
    let progid = progid.trim();
    if progid.is_empty() {
        return String::new();
    }

    if let Some(name) = store.shell_friendly_app_name(progid) {
        if name != progid {
            return name;
        }
    }

    const APP_PREFIX: &str = r"applications\";
    if progid.len() > APP_PREFIX.len() && progid[..APP_PREFIX.len()].eq_ignore_ascii_case(APP_PREFIX)
    {
        let tail = progid[APP_PREFIX.len()..].trim();
        if !tail.is_empty() {
            return tail.to_string();
        }
    }

    if let Some(command) = store.open_command(progid) {
        if let Some(exe) = exe_from_command(&command) {
            return exe;
        }
    }

    String::new()
}

/// Picker label: "appName - typeName" when both exist and differ, else
/// whichever is present, else the raw id.
pub fn picker_label(store: &dyn AssocRegistry, progid: &str) -> String {
    let progid = progid.trim();
    if progid.is_empty() {
        return String::new();
    }
    let app = app_name(store, progid);
    let typ = display_name(store, progid);
    if !app.is_empty() && !typ.is_empty() && app.to_lowercase() != typ.to_lowercase() {
        return format!("{app} - {typ}");
    }
    if !app.is_empty() {
        app
    } else if !typ.is_empty() {
        typ
    } else {
        progid.to_string()
    }
}

/// Display label: friendly label plus the raw id in parentheses for
/// traceability, unless the label already is the id.
pub fn display_label(store: &dyn AssocRegistry, progid: &str) -> String {
    let progid = progid.trim();
    if progid.is_empty() {
        return String::new();
    }
    let friendly = picker_label(store, progid);
    if !friendly.is_empty() && friendly != progid {
        format!("{friendly} ({progid})")
    } else {
        progid.to_string()
    }
}

/// Extract the executable name from a launch command line, best effort.
pub(crate) fn exe_from_command(command: &str) -> Option<String> {
    let s = command.trim();
    if s.is_empty() {
        return None;
    }

    // Quoted executable path first.
    if let Some(rest) = s.strip_prefix('"') {
        if let Some(end) = rest.find('"') {
            let exe = rest[..end].trim();
            if !exe.is_empty() {
                return Some(basename(exe).to_string());
            }
        }
    }

    // Unquoted first token.
    let token = s.split_whitespace().next()?;
    Some(basename(token).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::MemoryRegistry;

    #[test]
    fn user_choice_shadows_lower_tiers() {
        let reg = MemoryRegistry::new();
        reg.set_user_choice(".pdf", "Override.Handler");
        reg.set_user_class(".pdf", "UserClass.Handler");
        reg.set_machine_class(".pdf", "Machine.Handler");
        assert_eq!(
            effective_progid(&reg, ".pdf").as_deref(),
            Some("Override.Handler")
        );
    }

    #[test]
    fn falls_through_to_machine_default() {
        let reg = MemoryRegistry::new();
        reg.set_machine_class(".pdf", "Machine.Handler");
        assert_eq!(
            effective_progid(&reg, ".pdf").as_deref(),
            Some("Machine.Handler")
        );
        assert_eq!(effective_progid(&reg, ".zip"), None);
    }

    #[test]
    fn empty_tier_values_do_not_shadow_lower_tiers() {
        let reg = MemoryRegistry::new();
        reg.set_user_choice(".pdf", "");
        reg.set_user_class(".pdf", "   ");
        reg.set_machine_class(".pdf", "Machine.Handler");
        assert_eq!(
            effective_progid(&reg, ".pdf").as_deref(),
            Some("Machine.Handler")
        );

        // All tiers empty resolves to nothing, not to an empty id.
        reg.set_machine_class(".pdf", "");
        assert_eq!(effective_progid(&reg, ".pdf"), None);
    }

    #[test]
    fn normalizes_before_resolving() {
        let reg = MemoryRegistry::new();
        reg.set_user_class(".pdf", "AppX.Document");
        assert_eq!(
            effective_progid(&reg, "PDF").as_deref(),
            Some("AppX.Document")
        );
        assert_eq!(effective_progid(&reg, "  "), None);
    }

    #[test]
    fn progid_existence() {
        let reg = MemoryRegistry::new();
        reg.register_progid("AppX.Document");
        assert!(progid_exists(&reg, "AppX.Document"));
        assert!(progid_exists(&reg, "  AppX.Document  "));
        assert!(!progid_exists(&reg, "NoSuch.Handler"));
        assert!(!progid_exists(&reg, ""));
    }

    #[test]
    fn display_name_fallback_chain() {
        let reg = MemoryRegistry::new();

        reg.register_progid_with_label("Labeled.Doc", "Labeled Document");
        assert_eq!(display_name(&reg, "Labeled.Doc"), "Labeled Document");

        reg.register_progid_with_label("Indirect.Doc", "@shell32.dll,-22033");
        reg.add_indirect_string("@shell32.dll,-22033", "Resolved Document");
        assert_eq!(display_name(&reg, "Indirect.Doc"), "Resolved Document");

        reg.register_progid("Shell.Doc");
        reg.set_progid_shell_app_name("Shell.Doc", "Shell App");
        assert_eq!(display_name(&reg, "Shell.Doc"), "Shell App");

        reg.register_progid("Typed.Doc");
        reg.set_progid_friendly_type("Typed.Doc", "Typed Document");
        assert_eq!(display_name(&reg, "Typed.Doc"), "Typed Document");

        reg.register_progid("Cmd.Doc");
        reg.set_progid_open_command("Cmd.Doc", r#""C:\Apps\viewer.exe" "%1""#);
        assert_eq!(display_name(&reg, "Cmd.Doc"), "viewer.exe");

        // Worst case: the id itself.
        assert_eq!(display_name(&reg, "Bare.Doc"), "Bare.Doc");
        assert_eq!(display_name(&reg, ""), "");
    }

    #[test]
    fn labels_compose() {
        let reg = MemoryRegistry::new();
        reg.register_progid_with_label("AppX.Document", "PDF Document");
        reg.set_progid_shell_app_name("AppX.Document", "AppX");
        assert_eq!(picker_label(&reg, "AppX.Document"), "AppX - PDF Document");
        assert_eq!(
            display_label(&reg, "AppX.Document"),
            "AppX - PDF Document (AppX.Document)"
        );

        // Friendly label equal to the id: no parenthetical duplication.
        assert_eq!(display_label(&reg, "Raw.Handler"), "Raw.Handler");
    }

    #[test]
    fn application_namespace_app_name() {
        let reg = MemoryRegistry::new();
        reg.register_application("viewer.exe", &[".pdf"]);
        assert_eq!(app_name(&reg, r"Applications\viewer.exe"), "viewer.exe");
    }

    #[test]
    fn exe_extraction() {
        assert_eq!(
            exe_from_command(r#""C:\Program Files\App\app.exe" "%1""#).as_deref(),
            Some("app.exe")
        );
        assert_eq!(
            exe_from_command(r"C:\Tools\tool.exe %1").as_deref(),
            Some("tool.exe")
        );
        assert_eq!(exe_from_command("notepad %1").as_deref(), Some("notepad"));
        assert_eq!(exe_from_command("   "), None);
    }
}
