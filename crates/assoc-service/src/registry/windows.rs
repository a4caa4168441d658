//! Real registry backend.
//!
//! Windows 8+ blocks direct writes to the UserChoice override with a hash
//! the engine does not possess. The restore path therefore writes the lower
//! per-user class tier and deletes UserChoice so resolution falls through;
//! see [`crate::restore`] for the protocol.

use super::{AssocRegistry, Scope};
use anyhow::{anyhow, Result};
use std::ffi::c_void;
use std::ptr::{null, null_mut};
use tracing::debug;
use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteTreeW, RegDeleteValueW, RegEnumKeyExW, RegEnumValueW,
    RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY, HKEY_CLASSES_ROOT, HKEY_CURRENT_USER,
    KEY_READ, KEY_SET_VALUE, REG_EXPAND_SZ, REG_OPTION_NON_VOLATILE, REG_SZ,
};
use windows_sys::Win32::UI::Shell::{
    AssocQueryStringW, SHChangeNotify, SHLoadIndirectStringW, ASSOCF_NONE,
    ASSOCSTR_FRIENDLYAPPNAME, SHCNE_ASSOCCHANGED, SHCNF_IDLIST,
};

const FILEEXTS_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Explorer\FileExts";
const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";
const STARTUP_VALUE: &str = "WinAssocGuard";

/// Maximum registry value name length, per the registry element size limits.
const MAX_VALUE_NAME: usize = 16_384;
const MAX_KEY_NAME: usize = 256;

pub struct WindowsRegistry;

impl WindowsRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(Some(0)).collect()
}

fn from_wide(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

fn nonempty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn os_error(context: &str, code: u32) -> anyhow::Error {
    anyhow!(
        "{context}: {}",
        std::io::Error::from_raw_os_error(code as i32)
    )
}

/// Scoped registry handle, closed on every exit path.
struct Key(HKEY);

impl Key {
    fn open(root: HKEY, subkey: &str, access: u32) -> Option<Key> {
        let wide = to_wide(subkey);
        let mut handle: HKEY = unsafe { std::mem::zeroed() };
        let rc = unsafe { RegOpenKeyExW(root, wide.as_ptr(), 0, access, &mut handle) };
        // Not-found and access-denied both read as "no data here".
        if rc == ERROR_SUCCESS {
            Some(Key(handle))
        } else {
            None
        }
    }

    fn create(root: HKEY, subkey: &str, access: u32) -> Result<Key> {
        let wide = to_wide(subkey);
        let mut handle: HKEY = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            RegCreateKeyExW(
                root,
                wide.as_ptr(),
                0,
                null(),
                REG_OPTION_NON_VOLATILE,
                access,
                null(),
                &mut handle,
                null_mut(),
            )
        };
        if rc == ERROR_SUCCESS {
            Ok(Key(handle))
        } else {
            Err(os_error(&format!("create key {subkey}"), rc))
        }
    }

    /// Read a string value; `None` value name reads the key default.
    fn string_value(&self, value: Option<&str>) -> Option<String> {
        let wide_name = value.map(to_wide);
        let name_ptr = wide_name.as_ref().map_or(null(), |w| w.as_ptr());

        let mut kind: u32 = 0;
        let mut size: u32 = 0;
        let rc = unsafe {
            RegQueryValueExW(self.0, name_ptr, null_mut(), &mut kind, null_mut(), &mut size)
        };
        if rc != ERROR_SUCCESS || size == 0 {
            return None;
        }
        if kind != REG_SZ && kind != REG_EXPAND_SZ {
            return None;
        }

        let mut buf = vec![0u8; size as usize];
        let rc = unsafe {
            RegQueryValueExW(
                self.0,
                name_ptr,
                null_mut(),
                &mut kind,
                buf.as_mut_ptr(),
                &mut size,
            )
        };
        if rc != ERROR_SUCCESS {
            return None;
        }
        let wide: Vec<u16> = buf
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        nonempty(from_wide(&wide))
    }

    fn has_value(&self, name: &str) -> bool {
        let wide = to_wide(name);
        let rc = unsafe {
            RegQueryValueExW(self.0, wide.as_ptr(), null_mut(), null_mut(), null_mut(), null_mut())
        };
        rc == ERROR_SUCCESS
    }

    fn set_string_value(&self, name: Option<&str>, data: &str) -> Result<()> {
        let wide_name = name.map(to_wide);
        let name_ptr = wide_name.as_ref().map_or(null(), |w| w.as_ptr());
        let wide_data = to_wide(data);
        let byte_len = (wide_data.len() * 2) as u32;
        let rc = unsafe {
            RegSetValueExW(
                self.0,
                name_ptr,
                0,
                REG_SZ,
                wide_data.as_ptr() as *const u8,
                byte_len,
            )
        };
        if rc == ERROR_SUCCESS {
            Ok(())
        } else {
            Err(os_error("set value", rc))
        }
    }

    /// Names of all values under this key.
    fn value_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut index = 0u32;
        loop {
            let mut name = vec![0u16; MAX_VALUE_NAME];
            let mut len = name.len() as u32;
            let rc = unsafe {
                RegEnumValueW(
                    self.0,
                    index,
                    name.as_mut_ptr(),
                    &mut len,
                    null_mut(),
                    null_mut(),
                    null_mut(),
                    null_mut(),
                )
            };
            if rc != ERROR_SUCCESS {
                break;
            }
            if let Some(n) = nonempty(from_wide(&name)) {
                out.push(n);
            }
            index += 1;
        }
        out
    }

    /// String data of all values under this key.
    fn string_values(&self) -> Vec<String> {
        let mut out = Vec::new();
        for name in self.value_names() {
            if let Some(data) = self.string_value(Some(&name)) {
                out.push(data);
            }
        }
        out
    }

    fn subkeys(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut index = 0u32;
        loop {
            let mut name = vec![0u16; MAX_KEY_NAME];
            let mut len = name.len() as u32;
            let rc = unsafe {
                RegEnumKeyExW(
                    self.0,
                    index,
                    name.as_mut_ptr(),
                    &mut len,
                    null_mut(),
                    null_mut(),
                    null_mut(),
                    null_mut(),
                )
            };
            if rc != ERROR_SUCCESS {
                break;
            }
            if let Some(n) = nonempty(from_wide(&name)) {
                out.push(n);
            }
            index += 1;
        }
        out
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        unsafe {
            RegCloseKey(self.0);
        }
    }
}

fn read_string(root: HKEY, subkey: &str, value: Option<&str>) -> Option<String> {
    Key::open(root, subkey, KEY_READ)?.string_value(value)
}

fn key_exists(root: HKEY, subkey: &str) -> bool {
    Key::open(root, subkey, KEY_READ).is_some()
}

impl AssocRegistry for WindowsRegistry {
    fn user_choice_progid(&self, ext: &str) -> Option<String> {
        read_string(
            HKEY_CURRENT_USER,
            &format!(r"{FILEEXTS_KEY}\{ext}\UserChoice"),
            Some("ProgId"),
        )
    }

    fn user_class_progid(&self, ext: &str) -> Option<String> {
        read_string(HKEY_CURRENT_USER, &format!(r"Software\Classes\{ext}"), None)
    }

    fn machine_class_progid(&self, ext: &str) -> Option<String> {
        read_string(HKEY_CLASSES_ROOT, ext, None)
    }

    fn progid_exists(&self, progid: &str) -> bool {
        let progid = progid.trim();
        !progid.is_empty() && key_exists(HKEY_CLASSES_ROOT, progid)
    }

    fn class_default_label(&self, progid: &str) -> Option<String> {
        read_string(HKEY_CLASSES_ROOT, progid, None)
    }

    fn friendly_type_name(&self, progid: &str) -> Option<String> {
        read_string(HKEY_CLASSES_ROOT, progid, Some("FriendlyTypeName"))
    }

    fn shell_friendly_app_name(&self, progid: &str) -> Option<String> {
        let assoc = to_wide(progid);
        let extra = to_wide("open");

        let mut required: u32 = 0;
        let hr = unsafe {
            AssocQueryStringW(
                ASSOCF_NONE as u32,
                ASSOCSTR_FRIENDLYAPPNAME as i32,
                assoc.as_ptr(),
                extra.as_ptr(),
                null_mut(),
                &mut required,
            )
        };
        // S_OK or S_FALSE report the needed length; anything else is "no name".
        if (hr != 0 && hr != 1) || required == 0 {
            return None;
        }

        let mut buf = vec![0u16; required as usize];
        let hr = unsafe {
            AssocQueryStringW(
                ASSOCF_NONE as u32,
                ASSOCSTR_FRIENDLYAPPNAME as i32,
                assoc.as_ptr(),
                extra.as_ptr(),
                buf.as_mut_ptr(),
                &mut required,
            )
        };
        if hr != 0 {
            return None;
        }
        nonempty(from_wide(&buf))
    }

    fn open_command(&self, progid: &str) -> Option<String> {
        read_string(
            HKEY_CLASSES_ROOT,
            &format!(r"{progid}\shell\open\command"),
            None,
        )
    }

    fn resolve_indirect_string(&self, value: &str) -> Option<String> {
        if !value.starts_with('@') {
            return None;
        }
        let source = to_wide(value);
        let mut buf = vec![0u16; 1024];
        let hr = unsafe {
            SHLoadIndirectStringW(
                source.as_ptr(),
                buf.as_mut_ptr(),
                buf.len() as u32,
                null_mut(),
            )
        };
        if hr != 0 {
            return None;
        }
        nonempty(from_wide(&buf))
    }

    fn open_with_progids(&self, ext: &str, scope: Scope) -> Vec<String> {
        let key = match scope {
            Scope::User => Key::open(
                HKEY_CURRENT_USER,
                &format!(r"{FILEEXTS_KEY}\{ext}\OpenWithProgids"),
                KEY_READ,
            ),
            Scope::Machine => {
                Key::open(HKEY_CLASSES_ROOT, &format!(r"{ext}\OpenWithProgids"), KEY_READ)
            }
        };
        key.map(|k| k.value_names()).unwrap_or_default()
    }

    fn open_with_list(&self, ext: &str, scope: Scope) -> Vec<String> {
        let key = match scope {
            Scope::User => Key::open(
                HKEY_CURRENT_USER,
                &format!(r"{FILEEXTS_KEY}\{ext}\OpenWithList"),
                KEY_READ,
            ),
            Scope::Machine => {
                Key::open(HKEY_CLASSES_ROOT, &format!(r"{ext}\OpenWithList"), KEY_READ)
            }
        };
        key.map(|k| k.string_values()).unwrap_or_default()
    }

    fn registered_applications(&self) -> Vec<String> {
        Key::open(HKEY_CLASSES_ROOT, "Applications", KEY_READ)
            .map(|k| k.subkeys())
            .unwrap_or_default()
    }

    fn application_supports_ext(&self, app: &str, ext: &str) -> bool {
        Key::open(
            HKEY_CLASSES_ROOT,
            &format!(r"Applications\{app}\SupportedTypes"),
            KEY_READ,
        )
        .map(|k| k.has_value(ext))
        .unwrap_or(false)
    }

    fn user_choice_extensions(&self) -> Vec<String> {
        let Some(key) = Key::open(HKEY_CURRENT_USER, FILEEXTS_KEY, KEY_READ) else {
            return Vec::new();
        };
        let mut out: Vec<String> = key
            .subkeys()
            .into_iter()
            .filter(|name| name.starts_with('.'))
            .filter(|name| {
                key_exists(
                    HKEY_CURRENT_USER,
                    &format!(r"{FILEEXTS_KEY}\{name}\UserChoice"),
                )
            })
            .map(|name| name.to_lowercase())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    fn set_user_class_default(&self, ext: &str, progid: &str) -> Result<()> {
        let key = Key::create(
            HKEY_CURRENT_USER,
            &format!(r"Software\Classes\{ext}"),
            KEY_SET_VALUE,
        )?;
        key.set_string_value(None, progid)
    }

    fn delete_user_choice(&self, ext: &str) -> Result<()> {
        let subkey = to_wide(&format!(r"{FILEEXTS_KEY}\{ext}\UserChoice"));
        let rc = unsafe { RegDeleteTreeW(HKEY_CURRENT_USER, subkey.as_ptr()) };
        if rc == ERROR_SUCCESS || rc == ERROR_FILE_NOT_FOUND {
            Ok(())
        } else {
            Err(os_error(&format!("delete UserChoice for {ext}"), rc))
        }
    }

    fn broadcast_assoc_changed(&self) {
        debug!("broadcasting association change to the shell");
        unsafe {
            SHChangeNotify(
                SHCNE_ASSOCCHANGED as i32,
                SHCNF_IDLIST as u32,
                null::<c_void>(),
                null::<c_void>(),
            );
        }
    }

    fn startup_command(&self) -> Option<String> {
        read_string(HKEY_CURRENT_USER, RUN_KEY, Some(STARTUP_VALUE))
    }

    fn set_startup_command(&self, command: Option<&str>) -> Result<()> {
        match command {
            Some(cmd) => {
                let key = Key::create(HKEY_CURRENT_USER, RUN_KEY, KEY_SET_VALUE)?;
                key.set_string_value(Some(STARTUP_VALUE), cmd)
            }
            None => {
                let Some(key) = Key::open(HKEY_CURRENT_USER, RUN_KEY, KEY_SET_VALUE) else {
                    return Ok(());
                };
                let name = to_wide(STARTUP_VALUE);
                let rc = unsafe { RegDeleteValueW(key.0, name.as_ptr()) };
                if rc == ERROR_SUCCESS || rc == ERROR_FILE_NOT_FOUND {
                    Ok(())
                } else {
                    Err(os_error("remove startup entry", rc))
                }
            }
        }
    }
}
