//! High-level command orchestration for the CLI.
//!
//! Each function here corresponds to a subcommand in `main.rs` and is also
//! reused by the interactive menu. Mutating commands take an advisory backup
//! first: a failed backup is reported as a warning and the command carries on.

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};

use crate::backup::BackupStore;
use crate::doctor::run_doctor;
use crate::foundry::{self, CurrentConfig, FoundryConfig, mask_secret};
use crate::paths::Paths;
use crate::store::{ClearReport, VariableStore};
use crate::ui::Ui;
use crate::vars::{self, VarKey};

const RESTART_HINT: &str = "Restart your terminal (or log out and back in) for the change to take effect.";

/// Snapshot before a change; failures only warn
fn backup_before(backups: &BackupStore, description: &str, ui: &Ui) {
    match backups.create(description) {
        Ok(filename) => tracing::debug!(file = %filename, "pre-change backup written"),
        Err(e) => ui.warn(format!("Failed to create backup: {:#}", e)),
    }
}

fn report_leftovers(report: &ClearReport, ui: &Ui) {
    for (key, err) in &report.failed {
        ui.warn(format!("Could not remove {}: {:#}", key, err));
    }
}

/// Route Claude Code through Azure AI Foundry
pub fn configure(paths: &Paths, store: &VariableStore, cfg: &FoundryConfig, ui: &Ui) -> Result<()> {
    cfg.validate()?;
    let backups = BackupStore::new(paths, store);
    backup_before(&backups, "Before configuring Azure Foundry", ui);

    let spinner = ui.spinner(format!("Writing configuration to {}...", store.location()));
    match foundry::apply(store, cfg) {
        Ok(()) => {
            ui.spinner_finish_ok(&spinner, "Azure Foundry configuration applied");
            ui.println(ui.dim(RESTART_HINT));
            Ok(())
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, "Failed to apply configuration");
            Err(e)
        }
    }
}

/// Remove every Foundry variable
pub fn rollback(paths: &Paths, store: &VariableStore, ui: &Ui) -> Result<()> {
    let backups = BackupStore::new(paths, store);
    backup_before(&backups, "Before rollback to default", ui);

    let report = foundry::rollback(store).context("Failed to roll back")?;
    report_leftovers(&report, ui);

    if report.is_clean() {
        ui.ok("Rolled back to the default Anthropic configuration");
    } else {
        ui.warn("Rolled back, but some variables could not be removed");
    }
    ui.println(ui.dim(RESTART_HINT));
    Ok(())
}

/// Print the current configuration
pub fn show(store: &VariableStore, ui: &Ui) -> Result<()> {
    let current = CurrentConfig::read(store)?;

    ui.section("Current Configuration");
    ui.newline();

    let mut table = ui.simple_table();
    table.add_row(vec![ui.cell("Stored in:"), ui.cell(store.location())]);

    if !current.use_foundry {
        table.add_row(vec![
            ui.cell("Mode:"),
            ui.colored_cell("Direct Anthropic API", AnsiColor::Yellow),
        ]);
        ui.println(table.to_string());
        return Ok(());
    }

    table.add_row(vec![
        ui.cell("Mode:"),
        ui.colored_cell("Azure Foundry", AnsiColor::Green),
    ]);
    table.add_row(vec![ui.cell("Resource:"), ui.value_cell(current.resource.as_deref())]);
    table.add_row(vec![ui.cell("Base URL:"), ui.value_cell(current.base_url.as_deref())]);
    let api_key = match &current.api_key {
        Some(key) => ui.cell(format!("{} (masked)", mask_secret(key))),
        None => ui.colored_cell("not set (Entra ID)", AnsiColor::Cyan),
    };
    table.add_row(vec![ui.cell("API key:"), api_key]);
    table.add_row(vec![ui.cell("Sonnet:"), ui.value_cell(current.sonnet_model.as_deref())]);
    table.add_row(vec![ui.cell("Haiku:"), ui.value_cell(current.haiku_model.as_deref())]);
    table.add_row(vec![ui.cell("Opus:"), ui.value_cell(current.opus_model.as_deref())]);

    ui.println(table.to_string());
    Ok(())
}

/// List all backups, newest first
pub fn backup_list(paths: &Paths, store: &VariableStore, ui: &Ui) -> Result<()> {
    let backups = BackupStore::new(paths, store);
    let summaries = backups.list()?;

    if summaries.is_empty() {
        ui.warn("No backups found.");
        ui.println(format!("Backup location: {}", backups.dir().display()));
        return Ok(());
    }

    ui.section(format!("Backups ({})", summaries.len()));
    ui.newline();

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell("#"),
        ui.header_cell("File"),
        ui.header_cell("Created"),
        ui.header_cell("Description"),
        ui.header_cell("Resource"),
    ]);

    for (i, summary) in summaries.iter().enumerate() {
        let resource = if summary.use_foundry {
            ui.cell(summary.resource.clone().unwrap_or_else(|| "(custom URL)".to_string()))
        } else {
            ui.colored_cell("(default Anthropic)", AnsiColor::BrightBlack)
        };
        table.add_row(vec![
            ui.cell((i + 1).to_string()),
            ui.cell(&summary.filename),
            ui.cell(
                summary
                    .timestamp
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ),
            ui.cell(&summary.description),
            resource,
        ]);
    }

    ui.println(table.to_string());
    ui.println(ui.dim(format!("Backup location: {}", backups.dir().display())));
    Ok(())
}

/// Save a manual backup
pub fn backup_create(paths: &Paths, store: &VariableStore, description: &str, ui: &Ui) -> Result<()> {
    let filename = BackupStore::new(paths, store)
        .create(description)
        .context("Failed to create backup")?;
    ui.ok(format!("Backup created: {}", filename));
    ui.println(ui.dim(format!("Location: {}", paths.backups_dir.display())));
    Ok(())
}

/// Show the variables saved in one backup
pub fn backup_show(paths: &Paths, store: &VariableStore, filename: &str, ui: &Ui) -> Result<()> {
    let snapshot = BackupStore::new(paths, store).load(filename)?;

    ui.section(format!("Backup: {}", filename));
    ui.newline();

    let mut table = ui.simple_table();
    table.add_row(vec![
        ui.cell("Created:"),
        ui.cell(
            snapshot
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ),
    ]);
    table.add_row(vec![ui.cell("Description:"), ui.cell(&snapshot.description)]);
    ui.println(table.to_string());
    ui.newline();

    let saved = vars::from_env_map(&snapshot.variables);
    if saved.is_empty() {
        ui.info("No Foundry variables were set (default Anthropic configuration)");
        return Ok(());
    }

    let mut vars_table = ui.table();
    vars_table.set_header(vec![ui.header_cell("Variable"), ui.header_cell("Value")]);
    for key in VarKey::all() {
        let value = saved.get(&key).map(|v| {
            if key.is_secret() { mask_secret(v) } else { v.clone() }
        });
        vars_table.add_row(vec![ui.cell(key.env_name()), ui.value_cell(value.as_deref())]);
    }
    ui.println(vars_table.to_string());
    Ok(())
}

/// Restore a backup, replacing the current variables
pub fn backup_restore(
    paths: &Paths,
    store: &VariableStore,
    filename: &str,
    assume_yes: bool,
    ui: &Ui,
) -> Result<()> {
    let backups = BackupStore::new(paths, store);
    // Fail on a bad name before prompting or taking a backup
    backups.load(filename)?;

    if !assume_yes {
        let confirm = inquire::Confirm::new(&format!("Restore configuration from '{}'?", filename))
            .with_default(false)
            .with_help_message("The current variables are backed up first, then replaced")
            .prompt()
            .context("Confirmation cancelled")?;
        if !confirm {
            ui.warn("Restore cancelled.");
            return Ok(());
        }
    }

    backup_before(&backups, "Before restore operation", ui);

    let spinner = ui.spinner(format!("Restoring {}...", filename));
    match backups.restore(filename) {
        Ok(report) => {
            ui.spinner_finish_ok(&spinner, format!("Configuration restored from {}", filename));
            report_leftovers(&report, ui);
            ui.println(ui.dim(RESTART_HINT));
            Ok(())
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, "Restore failed");
            Err(e)
        }
    }
}

/// Delete one backup file
pub fn backup_delete(
    paths: &Paths,
    store: &VariableStore,
    filename: &str,
    assume_yes: bool,
    ui: &Ui,
) -> Result<()> {
    if !assume_yes {
        let confirm = inquire::Confirm::new(&format!("Delete backup '{}'?", filename))
            .with_default(false)
            .prompt()
            .context("Confirmation cancelled")?;
        if !confirm {
            ui.warn("Delete cancelled.");
            return Ok(());
        }
    }

    BackupStore::new(paths, store).delete(filename)?;
    ui.ok(format!("Deleted backup {}", filename));
    Ok(())
}

/// Keep only the newest `keep` backups
pub fn backup_prune(paths: &Paths, store: &VariableStore, keep: usize, ui: &Ui) -> Result<()> {
    let removed = BackupStore::new(paths, store).prune(keep)?;
    if removed.is_empty() {
        ui.ok(format!("No backups to remove (keeping {})", keep));
    } else {
        for filename in &removed {
            ui.println(format!("  {} {}", ui.icon_info(), filename));
        }
        ui.ok(format!("Removed {} old backup(s), keeping {}", removed.len(), keep));
    }
    Ok(())
}

/// Run diagnostics; fails when any check finds a problem
pub fn doctor(paths: &Paths, store: &VariableStore, ui: &Ui) -> Result<()> {
    let issues = run_doctor(paths, store, ui);
    if issues > 0 {
        bail!("Doctor found problems in {} check(s)", issues);
    }
    Ok(())
}
