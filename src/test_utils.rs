//! Test utilities shared across test modules
//!
//! This module provides common helper functions for testing, avoiding duplication
//! across multiple test suites.

use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tempfile::TempDir;

use crate::paths::{Paths, ShellKind};
use crate::store::{Backend, VariableStore};
use crate::vars::{VarKey, VarMap};

/// Create a Paths struct for testing using a temporary directory as $HOME
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths::with_home(temp_dir.path(), ShellKind::Zsh)
}

/// A fully configured variable set
pub fn sample_vars() -> VarMap {
    [
        (VarKey::UseFoundry, "true"),
        (VarKey::Resource, "acme"),
        (VarKey::BaseUrl, "https://acme.services.ai.azure.com/models"),
        (VarKey::ApiKey, "sk-test-1234567890"),
        (VarKey::SonnetModel, "claude-sonnet-4-5"),
        (VarKey::HaikuModel, "claude-haiku-4-5"),
        (VarKey::OpusModel, "claude-opus-4-1"),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect()
}

/// Observable state behind a [`MemoryBackend`]
#[derive(Debug, Default)]
pub struct MemoryState {
    pub vars: VarMap,
    pub notifications: usize,
    /// Keys whose removal should fail
    pub fail_remove: HashSet<VarKey>,
}

/// In-memory backend that records notifications
pub struct MemoryBackend {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryBackend {
    /// A store over a fresh memory backend, plus a handle to inspect it
    pub fn store() -> (VariableStore, Rc<RefCell<MemoryState>>) {
        let state = Rc::new(RefCell::new(MemoryState::default()));
        let backend = MemoryBackend {
            state: Rc::clone(&state),
        };
        (VariableStore::new(Box::new(backend)), state)
    }
}

impl Backend for MemoryBackend {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn get(&self, key: VarKey) -> Result<Option<String>> {
        Ok(self.state.borrow().vars.get(&key).cloned())
    }

    fn load(&self) -> Result<VarMap> {
        Ok(self.state.borrow().vars.clone())
    }

    fn merge(&self, vars: &VarMap) -> Result<()> {
        let mut state = self.state.borrow_mut();
        for (key, value) in vars {
            state.vars.insert(*key, value.clone());
        }
        Ok(())
    }

    fn remove(&self, key: VarKey) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_remove.contains(&key) {
            return Err(anyhow!("simulated failure removing {}", key));
        }
        state.vars.remove(&key);
        Ok(())
    }

    fn notify(&self) -> Result<()> {
        self.state.borrow_mut().notifications += 1;
        Ok(())
    }
}
