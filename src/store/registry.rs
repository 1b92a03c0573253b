//! Windows registry backend.
//!
//! Variables are machine-wide environment values under
//! `HKLM\SYSTEM\CurrentControlSet\Control\Session Manager\Environment`.
//! Writing needs an elevated process. After a change, `notify` broadcasts
//! `WM_SETTINGCHANGE` so Explorer and new consoles reload the environment.

use anyhow::{Result, anyhow, bail};
use windows::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, LPARAM, WIN32_ERROR, WPARAM,
};
use windows::Win32::System::Registry::{
    HKEY, HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_SAM_FLAGS, REG_SZ,
    REG_VALUE_TYPE, RRF_RT_REG_EXPAND_SZ, RRF_RT_REG_SZ, RegCloseKey, RegDeleteValueW,
    RegGetValueW, RegOpenKeyExW, RegSetValueExW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    HWND_BROADCAST, SMTO_ABORTIFHUNG, SendMessageTimeoutW, WM_SETTINGCHANGE,
};
use windows::core::PCWSTR;

use super::Backend;
use crate::vars::{VarKey, VarMap};

pub const ENVIRONMENT_KEY: &str = r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

/// How long a hung window may hold up the settings broadcast
const BROADCAST_TIMEOUT_MS: u32 = 5000;

#[derive(Debug, Default, Clone)]
pub struct RegistryBackend;

impl RegistryBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Open registry key, closed on drop
struct KeyGuard(HKEY);

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let _ = unsafe { RegCloseKey(self.0) };
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    let mut wide: Vec<u16> = s.encode_utf16().collect();
    wide.push(0);
    wide
}

fn open_environment(access: REG_SAM_FLAGS) -> Result<KeyGuard> {
    let path = to_wide(ENVIRONMENT_KEY);
    let mut key = HKEY::default();
    let status = unsafe {
        RegOpenKeyExW(
            HKEY_LOCAL_MACHINE,
            PCWSTR(path.as_ptr()),
            Some(0),
            access,
            &mut key,
        )
    };
    if status != ERROR_SUCCESS {
        return Err(status_error(status, "open the machine environment key"));
    }
    Ok(KeyGuard(key))
}

fn status_error(status: WIN32_ERROR, action: &str) -> anyhow::Error {
    if status == ERROR_ACCESS_DENIED {
        anyhow!(
            "Access denied while trying to {} (run from an elevated/Administrator prompt)",
            action
        )
    } else {
        anyhow!("Failed to {}: status={}", action, status.0)
    }
}

impl Backend for RegistryBackend {
    fn location(&self) -> String {
        format!(r"HKLM\{}", ENVIRONMENT_KEY)
    }

    fn get(&self, var: VarKey) -> Result<Option<String>> {
        let key = open_environment(KEY_QUERY_VALUE)?;
        let name = to_wide(var.env_name());
        let mut value_type = REG_VALUE_TYPE(0);
        let mut size_bytes: u32 = 0;

        let status = unsafe {
            RegGetValueW(
                key.0,
                PCWSTR::null(),
                PCWSTR(name.as_ptr()),
                RRF_RT_REG_SZ | RRF_RT_REG_EXPAND_SZ,
                Some(&mut value_type),
                None,
                Some(&mut size_bytes),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != ERROR_SUCCESS {
            return Err(status_error(status, &format!("read {}", var)));
        }

        let mut buffer: Vec<u16> = vec![0u16; (size_bytes as usize / 2).max(1)];
        let status = unsafe {
            RegGetValueW(
                key.0,
                PCWSTR::null(),
                PCWSTR(name.as_ptr()),
                RRF_RT_REG_SZ | RRF_RT_REG_EXPAND_SZ,
                Some(&mut value_type),
                Some(buffer.as_mut_ptr() as *mut _),
                Some(&mut size_bytes),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != ERROR_SUCCESS {
            return Err(status_error(status, &format!("read {}", var)));
        }

        // size includes the terminating null
        let char_len = (size_bytes as usize / 2).saturating_sub(1);
        buffer.truncate(char_len);
        Ok(Some(String::from_utf16_lossy(&buffer)))
    }

    fn load(&self) -> Result<VarMap> {
        let mut vars = VarMap::new();
        for key in VarKey::all() {
            if let Some(value) = self.get(key)? {
                vars.insert(key, value);
            }
        }
        Ok(vars)
    }

    fn merge(&self, vars: &VarMap) -> Result<()> {
        if vars.is_empty() {
            return Ok(());
        }
        let key = open_environment(KEY_SET_VALUE)?;
        for (var, value) in vars {
            let name = to_wide(var.env_name());
            let data = to_wide(value);
            let status = unsafe {
                RegSetValueExW(
                    key.0,
                    PCWSTR(name.as_ptr()),
                    Some(0),
                    REG_SZ,
                    Some(std::slice::from_raw_parts(
                        data.as_ptr() as *const u8,
                        data.len() * 2,
                    )),
                )
            };
            if status != ERROR_SUCCESS {
                return Err(status_error(status, &format!("set {}", var)));
            }
            tracing::debug!(key = %var, "registry value set");
        }
        Ok(())
    }

    fn remove(&self, var: VarKey) -> Result<()> {
        let key = open_environment(KEY_SET_VALUE)?;
        let name = to_wide(var.env_name());
        let status = unsafe { RegDeleteValueW(key.0, PCWSTR(name.as_ptr())) };
        if status == ERROR_SUCCESS || status == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        Err(status_error(status, &format!("delete {}", var)))
    }

    fn notify(&self) -> Result<()> {
        let area = to_wide("Environment");
        let mut result: usize = 0;
        let ret = unsafe {
            SendMessageTimeoutW(
                HWND_BROADCAST,
                WM_SETTINGCHANGE,
                WPARAM(0),
                LPARAM(area.as_ptr() as isize),
                SMTO_ABORTIFHUNG,
                BROADCAST_TIMEOUT_MS,
                Some(&mut result),
            )
        };
        if ret.0 == 0 {
            let err = windows::core::Error::from_win32();
            bail!("SendMessageTimeout(WM_SETTINGCHANGE) failed: {}", err);
        }
        tracing::debug!("environment change broadcast");
        Ok(())
    }
}
