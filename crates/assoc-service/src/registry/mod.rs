//! The OS boundary: everything the engine asks of the Windows registry,
//! expressed as one object-safe trait.
//!
//! Read methods never fail — key-not-found and access-denied both come back
//! as `None`/`false`/empty, so callers degrade to "nothing found" instead of
//! aborting. Only the mutating calls return `Result`; their error strings end
//! up in restore outcomes, never as panics or propagated aborts.
//!
//! [`windows::WindowsRegistry`] is the real backend. [`memory::MemoryRegistry`]
//! models the same layered store in process memory so the resolver, discovery,
//! restore, and monitor logic are testable on any platform.

use anyhow::Result;

pub mod memory;
#[cfg(windows)]
pub mod windows;

/// Which hive an "open with" index is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Per-user (HKCU\...\Explorer\FileExts).
    User,
    /// System-wide (HKCR).
    Machine,
}

/// Map an executable name from an OpenWithList entry to its handler id in the
/// application namespace.
pub fn application_progid(exe: &str) -> String {
    format!(r"Applications\{exe}")
}

pub trait AssocRegistry: Send + Sync {
    // ── resolution tiers, topmost first ─────────────────────────────────
    /// Per-user explicit override (the UserChoice record the shell writes).
    fn user_choice_progid(&self, ext: &str) -> Option<String>;
    /// Per-user default-class registration (HKCU\Software\Classes\.ext).
    fn user_class_progid(&self, ext: &str) -> Option<String>;
    /// System-wide default-class registration (HKCR\.ext).
    fn machine_class_progid(&self, ext: &str) -> Option<String>;

    // ── handler namespace ───────────────────────────────────────────────
    /// Whether a registration exists under the global handler namespace.
    fn progid_exists(&self, progid: &str) -> bool;
    /// Default label of the handler's class key, unresolved.
    fn class_default_label(&self, progid: &str) -> Option<String>;
    /// The documented FriendlyTypeName value, if present.
    fn friendly_type_name(&self, progid: &str) -> Option<String>;
    /// The shell's friendly-name query for the handler.
    fn shell_friendly_app_name(&self, progid: &str) -> Option<String>;
    /// The handler's open verb command line.
    fn open_command(&self, progid: &str) -> Option<String>;
    /// Resolve an indirect resource string (`@dll,-id` form).
    fn resolve_indirect_string(&self, value: &str) -> Option<String>;

    // ── discovery indices ───────────────────────────────────────────────
    /// Handler ids recorded in the OpenWithProgids index for an extension.
    fn open_with_progids(&self, ext: &str, scope: Scope) -> Vec<String>;
    /// Executable names recorded in the OpenWithList for an extension.
    fn open_with_list(&self, ext: &str, scope: Scope) -> Vec<String>;
    /// All keys under the system-wide application registry.
    fn registered_applications(&self) -> Vec<String>;
    /// Whether an application declares support for an extension.
    fn application_supports_ext(&self, app: &str, ext: &str) -> bool;
    /// Extensions that carry a per-user override record (for import).
    fn user_choice_extensions(&self) -> Vec<String>;

    // ── mutations ───────────────────────────────────────────────────────
    /// Write the per-user default-class registration for an extension.
    fn set_user_class_default(&self, ext: &str, progid: &str) -> Result<()>;
    /// Delete the per-user override record so resolution falls through.
    fn delete_user_choice(&self, ext: &str) -> Result<()>;
    /// Tell running shell components that associations changed.
    fn broadcast_assoc_changed(&self);

    // ── startup registration ────────────────────────────────────────────
    /// Command line registered under the per-user Run key, if any.
    fn startup_command(&self) -> Option<String>;
    /// Register (`Some`) or remove (`None`) the per-user Run entry.
    fn set_startup_command(&self, command: Option<&str>) -> Result<()>;
}
