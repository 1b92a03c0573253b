//! Snapshots of the managed variable set.
//!
//! Each snapshot is one pretty-printed JSON file in `~/.claude-code-backups`,
//! named `backup_<YYYYMMDD>_<HHMMSS>.json` after its creation time. Two
//! snapshots taken within the same second get a `_<n>` suffix rather than
//! overwriting each other.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::fs_utils::atomic_write;
use crate::paths::Paths;
use crate::store::{ClearReport, VariableStore};
use crate::vars::{self, VarKey};

/// A saved copy of the full variable set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub variables: BTreeMap<String, String>,
}

/// Listing entry for one snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotSummary {
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub use_foundry: bool,
    pub resource: Option<String>,
}

impl Snapshot {
    fn summary(&self, filename: String) -> SnapshotSummary {
        SnapshotSummary {
            filename,
            timestamp: self.timestamp,
            description: self.description.clone(),
            use_foundry: self
                .variables
                .get(VarKey::UseFoundry.env_name())
                .is_some_and(|v| vars::is_truthy(v)),
            resource: self
                .variables
                .get(VarKey::Resource.env_name())
                .filter(|r| !r.is_empty())
                .cloned(),
        }
    }
}

/// Creates, lists and restores snapshots for one variable store
pub struct BackupStore<'a> {
    paths: &'a Paths,
    store: &'a VariableStore,
}

impl<'a> BackupStore<'a> {
    pub fn new(paths: &'a Paths, store: &'a VariableStore) -> Self {
        Self { paths, store }
    }

    pub fn dir(&self) -> &Path {
        &self.paths.backups_dir
    }

    /// Snapshot the current variables. Returns the new file's name.
    pub fn create(&self, description: &str) -> Result<String> {
        self.paths.ensure_backups_dir()?;

        let current = self.store.read_all().context("Failed to read current variables")?;
        let snapshot = Snapshot {
            timestamp: Utc::now(),
            description: description.to_string(),
            variables: vars::to_env_map(&current),
        };

        let filename = self.unused_filename(&snapshot.timestamp);
        let content =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize backup")?;
        let path = self.paths.backup_file(&filename);
        atomic_write(&path, content.as_bytes())
            .with_context(|| format!("Failed to write backup file: {:?}", path))?;

        tracing::info!(file = %filename, vars = current.len(), "backup created");
        Ok(filename)
    }

    /// All readable snapshots, newest first
    pub fn list(&self) -> Result<Vec<SnapshotSummary>> {
        let dir = self.dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read backup directory: {:?}", dir))?;

        let mut summaries: Vec<SnapshotSummary> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|e| {
                let filename = e.file_name().to_str()?.to_string();
                if !filename.ends_with(".json") {
                    return None;
                }
                match read_snapshot(&e.path()) {
                    Ok(snapshot) => Some(snapshot.summary(filename)),
                    Err(err) => {
                        tracing::debug!(file = %filename, error = %err, "skipping unreadable backup");
                        None
                    }
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.filename.cmp(&a.filename)));
        Ok(summaries)
    }

    /// `.json` files in the backup directory that do not parse as snapshots
    pub fn unreadable(&self) -> Result<Vec<String>> {
        let dir = self.dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut bad = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to read backup directory: {:?}", dir))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") && entry.path().is_file() && read_snapshot(&entry.path()).is_err() {
                bad.push(name);
            }
        }
        bad.sort();
        Ok(bad)
    }

    /// Read one snapshot in full
    pub fn load(&self, filename: &str) -> Result<Snapshot> {
        validate_filename(filename)?;
        read_snapshot(&self.paths.backup_file(filename))
    }

    /// Replace the current variables with a snapshot's.
    ///
    /// Every managed key is deleted first so keys absent from the snapshot do
    /// not survive. Keys that could not be deleted are returned in the report.
    /// The environment is notified once, after the final write.
    pub fn restore(&self, filename: &str) -> Result<ClearReport> {
        let snapshot = self.load(filename)?;
        let variables = vars::from_env_map(&snapshot.variables);

        let report = self.store.delete_all();
        if !variables.is_empty() {
            self.store
                .write_all(&variables)
                .with_context(|| format!("Failed to restore variables from {}", filename))?;
        }
        self.store
            .notify()
            .context("Variables restored, but the change notification failed")?;

        tracing::info!(file = %filename, vars = variables.len(), "backup restored");
        Ok(report)
    }

    /// Remove one snapshot file
    pub fn delete(&self, filename: &str) -> Result<()> {
        validate_filename(filename)?;
        let path = self.paths.backup_file(filename);
        fs::remove_file(&path).with_context(|| format!("Failed to delete backup: {:?}", path))
    }

    /// Delete all but the `keep` newest snapshots. Returns the removed names.
    pub fn prune(&self, keep: usize) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for summary in self.list()?.into_iter().skip(keep) {
            self.delete(&summary.filename)?;
            removed.push(summary.filename);
        }
        Ok(removed)
    }

    fn unused_filename(&self, timestamp: &DateTime<Utc>) -> String {
        let stem = format!("backup_{}", timestamp.with_timezone(&Local).format("%Y%m%d_%H%M%S"));
        let mut candidate = format!("{}.json", stem);
        let mut n = 1;
        while self.paths.backup_file(&candidate).exists() {
            candidate = format!("{}_{}.json", stem, n);
            n += 1;
        }
        candidate
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse backup file: {:?}", path))
}

/// Only bare file names inside the backup directory are accepted
fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\'])
    {
        bail!(
            "Invalid backup name '{}'.\nHint: Use 'foundry-switch backup list' to see available backups.",
            filename
        );
    }
    Ok(())
}
