//! Diagnostics for `foundry-switch doctor`.
//!
//! Checks, in order:
//! - where variables are stored and whether that store can be read
//! - whether the managed profile block is well formed (non-Windows)
//! - which routing mode is active and whether it is complete
//! - the backup directory and any snapshot files that no longer parse

use anstyle::AnsiColor;

use crate::backup::BackupStore;
use crate::foundry::{CurrentConfig, mask_secret};
use crate::paths::Paths;
use crate::store::VariableStore;
use crate::ui::Ui;

/// Run every check. Returns the number of checks that found problems.
pub fn run_doctor(paths: &Paths, store: &VariableStore, ui: &Ui) -> usize {
    ui.section("foundry-switch Doctor");
    ui.newline();

    let mut issues = 0;

    issues += check_step(ui, "Variable Store", || match store.read_all() {
        Ok(vars) => {
            ui.println(format!("  {} Location: {}", ui.icon_ok(), store.location()));
            ui.println(format!("  {} {} managed variable(s) set", ui.icon_info(), vars.len()));
            true
        }
        Err(e) => {
            ui.println(format!("  {} Cannot read {}: {:#}", ui.icon_err(), store.location(), e));
            false
        }
    });

    #[cfg(not(windows))]
    {
        issues += check_step(ui, "Shell Profile", || check_profile(paths, ui));
    }

    issues += check_step(ui, "Routing Mode", || {
        let Ok(current) = CurrentConfig::read(store) else {
            ui.println(format!("  {} Mode unknown (store unreadable)", ui.icon_warn()));
            return true;
        };
        if !current.use_foundry {
            ui.println(format!("  {} Direct Anthropic API", ui.icon_info()));
            return true;
        }

        ui.println(format!("  {} Azure Foundry", ui.icon_ok()));
        match &current.api_key {
            Some(key) => ui.println(format!("  {} API key: {}", ui.icon_info(), mask_secret(key))),
            None => ui.println(format!("  {} No API key, Entra ID authentication", ui.icon_info())),
        }
        let missing: Vec<&str> = [
            ("base URL", current.base_url.is_none()),
            ("Sonnet model", current.sonnet_model.is_none()),
            ("Haiku model", current.haiku_model.is_none()),
            ("Opus model", current.opus_model.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        if missing.is_empty() {
            true
        } else {
            ui.println(format!("  {} Foundry is on but missing: {}", ui.icon_err(), missing.join(", ")));
            false
        }
    });

    issues += check_step(ui, "Backups", || {
        let backups = BackupStore::new(paths, store);
        if !backups.dir().exists() {
            ui.println(format!(
                "  {} No backup directory yet: {}",
                ui.icon_info(),
                backups.dir().display()
            ));
            return true;
        }
        ui.println(format!("  {} Directory: {}", ui.icon_ok(), backups.dir().display()));

        let mut ok = true;
        match backups.list() {
            Ok(list) => ui.println(format!("  {} {} backup(s)", ui.icon_info(), list.len())),
            Err(e) => {
                ui.println(format!("  {} Failed to list backups: {:#}", ui.icon_err(), e));
                ok = false;
            }
        }
        match backups.unreadable() {
            Ok(bad) => {
                for name in bad {
                    ui.println(format!("  {} Unreadable backup file: {}", ui.icon_warn(), name));
                }
            }
            Err(e) => {
                ui.println(format!("  {} Failed to scan backups: {:#}", ui.icon_err(), e));
                ok = false;
            }
        }
        ok
    });

    if issues == 0 {
        ui.ok("No problems found");
    }
    issues
}

#[cfg(not(windows))]
fn check_profile(paths: &Paths, ui: &Ui) -> bool {
    use crate::store::profile::ProfileBackend;

    let profile = ProfileBackend::new(paths.shell_profile());
    ui.println(format!(
        "  {} Shell: {} ({})",
        ui.icon_info(),
        paths.shell.name(),
        profile.path().display()
    ));
    match profile.document() {
        Ok(None) => {
            ui.println(format!("  {} Profile does not exist yet", ui.icon_info()));
            true
        }
        Ok(Some(doc)) if doc.has_block => {
            ui.println(format!("  {} Managed block is well formed", ui.icon_ok()));
            true
        }
        Ok(Some(_)) => {
            ui.println(format!("  {} No managed block", ui.icon_info()));
            true
        }
        Err(e) => {
            ui.println(format!("  {} {:#}", ui.icon_err(), e));
            false
        }
    }
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F) -> usize
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    let success = check_fn();
    if !success {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
    usize::from(!success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryBackend, sample_vars, setup_test_paths};
    use crate::ui::ColorMode;
    use crate::vars::VarKey;
    use std::fs;
    use tempfile::TempDir;

    fn test_ui() -> Ui {
        Ui::new(ColorMode::Never, false)
    }

    #[test]
    fn test_clean_install_has_no_issues() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let (store, _) = MemoryBackend::store();

        assert_eq!(run_doctor(&paths, &store, &test_ui()), 0);
    }

    #[test]
    fn test_incomplete_foundry_config_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let (store, _) = MemoryBackend::store();
        store.write_all(&sample_vars()).unwrap();
        store.delete(VarKey::BaseUrl).unwrap();

        assert_eq!(run_doctor(&paths, &store, &test_ui()), 1);
    }

    #[test]
    fn test_corrupt_backup_is_only_a_warning() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let (store, _) = MemoryBackend::store();
        paths.ensure_backups_dir().unwrap();
        fs::write(paths.backup_file("backup_bad.json"), "nope").unwrap();

        assert_eq!(run_doctor(&paths, &store, &test_ui()), 0);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_unterminated_profile_block_is_an_issue() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let (store, _) = MemoryBackend::store();
        fs::write(
            paths.shell_profile(),
            format!("{}\nexport CLAUDE_CODE_USE_FOUNDRY=\"true\"\n", crate::store::profile::MARKER_BEGIN),
        )
        .unwrap();

        assert_eq!(run_doctor(&paths, &store, &test_ui()), 1);
    }
}
