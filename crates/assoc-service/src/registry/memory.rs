//! In-memory model of the layered association store.
//!
//! Backs every test of the resolver, discovery, restore, and monitor logic,
//! and mirrors the real backend's semantics: three resolution tiers, a global
//! handler namespace, per-scope "open with" indices, and a write path that
//! can be forced to fail to exercise failure outcomes.

use super::{application_progid, AssocRegistry, Scope};
use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Default, Clone)]
struct ProgidRecord {
    label: Option<String>,
    friendly_type: Option<String>,
    shell_app_name: Option<String>,
    open_command: Option<String>,
}

#[derive(Default)]
struct Inner {
    user_choice: HashMap<String, String>,
    user_classes: HashMap<String, String>,
    machine_classes: HashMap<String, String>,
    progids: BTreeMap<String, ProgidRecord>,
    indirect_strings: HashMap<String, String>,
    user_open_with_progids: HashMap<String, Vec<String>>,
    machine_open_with_progids: HashMap<String, Vec<String>>,
    user_open_with_list: HashMap<String, Vec<String>>,
    machine_open_with_list: HashMap<String, Vec<String>>,
    applications: BTreeMap<String, BTreeSet<String>>,
    startup_command: Option<String>,
    fail_writes: bool,
    sticky_user_choice: bool,
    swallow_class_writes: bool,
    write_count: u64,
    broadcast_count: u64,
}

#[derive(Default)]
pub struct MemoryRegistry {
    inner: Mutex<Inner>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_progid(&self, progid: &str) {
        self.inner
            .lock()
            .progids
            .entry(progid.to_string())
            .or_default();
    }

    pub fn register_progid_with_label(&self, progid: &str, label: &str) {
        let mut inner = self.inner.lock();
        inner.progids.entry(progid.to_string()).or_default().label = Some(label.to_string());
    }

    pub fn set_progid_friendly_type(&self, progid: &str, name: &str) {
        let mut inner = self.inner.lock();
        inner
            .progids
            .entry(progid.to_string())
            .or_default()
            .friendly_type = Some(name.to_string());
    }

    pub fn set_progid_shell_app_name(&self, progid: &str, name: &str) {
        let mut inner = self.inner.lock();
        inner
            .progids
            .entry(progid.to_string())
            .or_default()
            .shell_app_name = Some(name.to_string());
    }

    pub fn set_progid_open_command(&self, progid: &str, command: &str) {
        let mut inner = self.inner.lock();
        inner
            .progids
            .entry(progid.to_string())
            .or_default()
            .open_command = Some(command.to_string());
    }

    pub fn add_indirect_string(&self, reference: &str, resolved: &str) {
        self.inner
            .lock()
            .indirect_strings
            .insert(reference.to_string(), resolved.to_string());
    }

    pub fn set_user_choice(&self, ext: &str, progid: &str) {
        self.inner
            .lock()
            .user_choice
            .insert(ext.to_string(), progid.to_string());
    }

    pub fn set_user_class(&self, ext: &str, progid: &str) {
        self.inner
            .lock()
            .user_classes
            .insert(ext.to_string(), progid.to_string());
    }

    pub fn set_machine_class(&self, ext: &str, progid: &str) {
        self.inner
            .lock()
            .machine_classes
            .insert(ext.to_string(), progid.to_string());
    }

    pub fn add_open_with_progid(&self, scope: Scope, ext: &str, progid: &str) {
        let mut inner = self.inner.lock();
        let map = match scope {
            Scope::User => &mut inner.user_open_with_progids,
            Scope::Machine => &mut inner.machine_open_with_progids,
        };
        map.entry(ext.to_string())
            .or_default()
            .push(progid.to_string());
    }

    pub fn add_open_with_exe(&self, scope: Scope, ext: &str, exe: &str) {
        let mut inner = self.inner.lock();
        let map = match scope {
            Scope::User => &mut inner.user_open_with_list,
            Scope::Machine => &mut inner.machine_open_with_list,
        };
        map.entry(ext.to_string()).or_default().push(exe.to_string());
    }

    /// Register an application key; registers the matching
    /// `Applications\<app>` handler id as well, like the real store does.
    pub fn register_application(&self, app: &str, supported_exts: &[&str]) {
        let mut inner = self.inner.lock();
        inner.applications.insert(
            app.to_string(),
            supported_exts.iter().map(|e| e.to_string()).collect(),
        );
        inner.progids.entry(application_progid(app)).or_default();
    }

    /// Make every subsequent mutation fail, for failure-path tests.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Model a system that re-asserts the override: deleting UserChoice
    /// reports success but leaves the record in place.
    pub fn set_sticky_user_choice(&self, sticky: bool) {
        self.inner.lock().sticky_user_choice = sticky;
    }

    /// Model the shell's lag right after a change: the class write reports
    /// success but a re-read does not see it yet.
    pub fn set_swallow_class_writes(&self, swallow: bool) {
        self.inner.lock().swallow_class_writes = swallow;
    }

    /// Number of mutating registry calls performed so far.
    pub fn write_count(&self) -> u64 {
        self.inner.lock().write_count
    }

    pub fn broadcast_count(&self) -> u64 {
        self.inner.lock().broadcast_count
    }
}

impl AssocRegistry for MemoryRegistry {
    fn user_choice_progid(&self, ext: &str) -> Option<String> {
        self.inner.lock().user_choice.get(ext).cloned()
    }

    fn user_class_progid(&self, ext: &str) -> Option<String> {
        self.inner.lock().user_classes.get(ext).cloned()
    }

    fn machine_class_progid(&self, ext: &str) -> Option<String> {
        self.inner.lock().machine_classes.get(ext).cloned()
    }

    fn progid_exists(&self, progid: &str) -> bool {
        self.inner.lock().progids.contains_key(progid.trim())
    }

    fn class_default_label(&self, progid: &str) -> Option<String> {
        self.inner.lock().progids.get(progid)?.label.clone()
    }

    fn friendly_type_name(&self, progid: &str) -> Option<String> {
        self.inner.lock().progids.get(progid)?.friendly_type.clone()
    }

    fn shell_friendly_app_name(&self, progid: &str) -> Option<String> {
        self.inner.lock().progids.get(progid)?.shell_app_name.clone()
    }

    fn open_command(&self, progid: &str) -> Option<String> {
        self.inner.lock().progids.get(progid)?.open_command.clone()
    }

    fn resolve_indirect_string(&self, value: &str) -> Option<String> {
        if !value.starts_with('@') {
            return None;
        }
        self.inner.lock().indirect_strings.get(value).cloned()
    }

    fn open_with_progids(&self, ext: &str, scope: Scope) -> Vec<String> {
        let inner = self.inner.lock();
        let map = match scope {
            Scope::User => &inner.user_open_with_progids,
            Scope::Machine => &inner.machine_open_with_progids,
        };
        map.get(ext).cloned().unwrap_or_default()
    }

    fn open_with_list(&self, ext: &str, scope: Scope) -> Vec<String> {
        let inner = self.inner.lock();
        let map = match scope {
            Scope::User => &inner.user_open_with_list,
            Scope::Machine => &inner.machine_open_with_list,
        };
        map.get(ext).cloned().unwrap_or_default()
    }

    fn registered_applications(&self) -> Vec<String> {
        self.inner.lock().applications.keys().cloned().collect()
    }

    fn application_supports_ext(&self, app: &str, ext: &str) -> bool {
        self.inner
            .lock()
            .applications
            .get(app)
            .map(|exts| exts.contains(ext))
            .unwrap_or(false)
    }

    fn user_choice_extensions(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut exts: Vec<String> = inner.user_choice.keys().cloned().collect();
        exts.sort();
        exts
    }

    fn set_user_class_default(&self, ext: &str, progid: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.write_count += 1;
        if inner.fail_writes {
            bail!("access is denied");
        }
        if !inner.swallow_class_writes {
            inner
                .user_classes
                .insert(ext.to_string(), progid.to_string());
        }
        Ok(())
    }

    fn delete_user_choice(&self, ext: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.write_count += 1;
        if inner.fail_writes {
            bail!("access is denied");
        }
        if !inner.sticky_user_choice {
            inner.user_choice.remove(ext);
        }
        Ok(())
    }

    fn broadcast_assoc_changed(&self) {
        self.inner.lock().broadcast_count += 1;
    }

    fn startup_command(&self) -> Option<String> {
        self.inner.lock().startup_command.clone()
    }

    fn set_startup_command(&self, command: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            bail!("access is denied");
        }
        inner.startup_command = command.map(|c| c.to_string());
        Ok(())
    }
}
