//! Persistent variable store.
//!
//! `VariableStore` is the platform-neutral facade over a [`Backend`]. On
//! Windows the backend edits the machine environment in the registry; every
//! other platform gets the shell profile editor.
//!
//! Mutating calls only persist. Broadcasting the change is a separate
//! [`VariableStore::notify`] call so a multi-step operation signals once.

pub mod profile;
#[cfg(windows)]
pub mod registry;

use anyhow::Result;

use crate::paths::Paths;
use crate::vars::{VarKey, VarMap};

/// Raw key-value persistence for one platform
pub trait Backend {
    /// Where the variables live, for display
    fn location(&self) -> String;

    /// Read one key; `None` when it is not set
    fn get(&self, key: VarKey) -> Result<Option<String>>;

    /// Every key currently set, including empty values
    fn load(&self) -> Result<VarMap>;

    /// Merge `vars` into the persisted set without touching other keys
    fn merge(&self, vars: &VarMap) -> Result<()>;

    /// Remove one key. Removing an absent key succeeds.
    fn remove(&self, key: VarKey) -> Result<()>;

    /// Tell running processes the persisted environment changed
    fn notify(&self) -> Result<()>;
}

/// Keys that survived a bulk delete
#[derive(Debug, Default)]
pub struct ClearReport {
    pub failed: Vec<(VarKey, anyhow::Error)>,
}

impl ClearReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Platform-agnostic access to the managed variables
pub struct VariableStore {
    backend: Box<dyn Backend>,
}

impl VariableStore {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Store backed by this host's persistence mechanism
    #[cfg(windows)]
    pub fn for_host(_paths: &Paths) -> Self {
        Self::new(Box::new(registry::RegistryBackend::new()))
    }

    /// Store backed by this host's persistence mechanism
    #[cfg(not(windows))]
    pub fn for_host(paths: &Paths) -> Self {
        Self::new(Box::new(profile::ProfileBackend::new(paths.shell_profile())))
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    pub fn read(&self, key: VarKey) -> Result<Option<String>> {
        self.backend.get(key)
    }

    /// Every key with a non-empty value
    pub fn read_all(&self) -> Result<VarMap> {
        let mut vars = self.backend.load()?;
        vars.retain(|_, value| !value.is_empty());
        Ok(vars)
    }

    pub fn write(&self, key: VarKey, value: &str) -> Result<()> {
        let mut vars = VarMap::new();
        vars.insert(key, value.to_string());
        self.write_all(&vars)
    }

    /// Merge `vars` into the current set; unmentioned keys are kept
    pub fn write_all(&self, vars: &VarMap) -> Result<()> {
        tracing::debug!(count = vars.len(), location = %self.location(), "writing variables");
        self.backend.merge(vars)
    }

    pub fn delete(&self, key: VarKey) -> Result<()> {
        tracing::debug!(key = %key, "deleting variable");
        self.backend.remove(key)
    }

    /// Remove every managed key, carrying on past individual failures
    pub fn delete_all(&self) -> ClearReport {
        let mut report = ClearReport::default();
        for key in VarKey::all() {
            if let Err(e) = self.backend.remove(key) {
                tracing::warn!(key = %key, error = %e, "failed to delete variable");
                report.failed.push((key, e));
            }
        }
        report
    }

    pub fn notify(&self) -> Result<()> {
        self.backend.notify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryBackend, sample_vars};

    #[test]
    fn test_write_then_read_keeps_other_keys() {
        let (store, _) = MemoryBackend::store();
        store.write_all(&sample_vars()).unwrap();

        store.write(VarKey::Resource, "other").unwrap();

        assert_eq!(store.read(VarKey::Resource).unwrap().as_deref(), Some("other"));
        let all = store.read_all().unwrap();
        for (key, value) in sample_vars() {
            if key != VarKey::Resource {
                assert_eq!(all.get(&key), Some(&value));
            }
        }
    }

    #[test]
    fn test_read_absent_is_none() {
        let (store, _) = MemoryBackend::store();
        assert_eq!(store.read(VarKey::ApiKey).unwrap(), None);
    }

    #[test]
    fn test_read_all_omits_empty_values() {
        let (store, _) = MemoryBackend::store();
        store.write(VarKey::Resource, "acme").unwrap();
        store.write(VarKey::ApiKey, "").unwrap();

        assert_eq!(store.read(VarKey::ApiKey).unwrap().as_deref(), Some(""));
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all.contains_key(&VarKey::ApiKey));
    }

    #[test]
    fn test_delete_absent_succeeds() {
        let (store, _) = MemoryBackend::store();
        assert!(store.delete(VarKey::OpusModel).is_ok());
    }

    #[test]
    fn test_delete_all_continues_past_failures() {
        let (store, state) = MemoryBackend::store();
        store.write_all(&sample_vars()).unwrap();
        state.borrow_mut().fail_remove.insert(VarKey::BaseUrl);

        let report = store.delete_all();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, VarKey::BaseUrl);
        let left = store.read_all().unwrap();
        assert_eq!(left.keys().copied().collect::<Vec<_>>(), vec![VarKey::BaseUrl]);
    }

    #[test]
    fn test_mutations_do_not_notify() {
        let (store, state) = MemoryBackend::store();
        store.write_all(&sample_vars()).unwrap();
        store.delete(VarKey::Resource).unwrap();
        store.delete_all();
        assert_eq!(state.borrow().notifications, 0);

        store.notify().unwrap();
        assert_eq!(state.borrow().notifications, 1);
    }
}
