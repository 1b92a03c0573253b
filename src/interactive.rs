//! Menu-driven mode, used when no subcommand is given.
//!
//! All questions go through a [`Prompter`]. The binary uses [`InquirePrompter`];
//! tests drive the menu with scripted answers.

use anyhow::{Result, anyhow, bail};
use inquire::{Confirm, InquireError, Password, PasswordDisplayMode, Select, Text};

use crate::backup::BackupStore;
use crate::commands;
use crate::foundry::{
    CurrentConfig, DEFAULT_HAIKU_MODEL, DEFAULT_OPUS_MODEL, DEFAULT_SONNET_MODEL, Endpoint,
    FoundryConfig, mask_secret,
};
use crate::paths::Paths;
use crate::store::VariableStore;
use crate::ui::Ui;

const MENU: [&str; 7] = [
    "Configure Azure Foundry",
    "Rollback to default (direct Anthropic)",
    "View current configuration",
    "List available backups",
    "Restore from backup",
    "Save manual backup",
    "Exit",
];

/// Source of answers for the interactive menu
pub trait Prompter {
    /// Index of the chosen option; `None` when the user cancels
    fn select(&self, message: &str, options: &[String]) -> Result<Option<usize>>;

    fn text(&self, message: &str, default: Option<&str>) -> Result<String>;

    /// Hidden input; an empty answer is allowed
    fn password(&self, message: &str, help: &str) -> Result<String>;

    fn confirm(&self, message: &str, default: bool) -> Result<bool>;
}

/// Terminal prompts backed by `inquire`
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn select(&self, message: &str, options: &[String]) -> Result<Option<usize>> {
        match Select::new(message, options.to_vec()).raw_prompt() {
            Ok(choice) => Ok(Some(choice.index)),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
            Err(e) => Err(anyhow!("Prompt failed: {}", e)),
        }
    }

    fn text(&self, message: &str, default: Option<&str>) -> Result<String> {
        let mut prompt = Text::new(message);
        if let Some(default) = default {
            prompt = prompt.with_default(default);
        }
        prompt.prompt().map_err(|e| anyhow!("Prompt failed: {}", e))
    }

    fn password(&self, message: &str, help: &str) -> Result<String> {
        Password::new(message)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .with_help_message(help)
            .prompt()
            .map_err(|e| anyhow!("Prompt failed: {}", e))
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        Confirm::new(message)
            .with_default(default)
            .prompt()
            .map_err(|e| anyhow!("Prompt failed: {}", e))
    }
}

/// Loop over the main menu until the user exits
pub fn run(paths: &Paths, store: &VariableStore, prompter: &dyn Prompter, ui: &Ui) -> Result<()> {
    let options: Vec<String> = MENU.iter().map(|s| s.to_string()).collect();

    loop {
        ui.newline();
        ui.section("Claude Code - Azure Foundry Configuration");
        match CurrentConfig::read(store) {
            Ok(current) if current.use_foundry => ui.println(ui.dim("Mode: Azure Foundry")),
            Ok(_) => ui.println(ui.dim("Mode: Direct Anthropic API")),
            Err(e) => ui.warn(format!("Cannot read current configuration: {:#}", e)),
        }
        ui.newline();

        let Some(choice) = prompter.select("What would you like to do?", &options)? else {
            break;
        };

        let (result, failure) = match choice {
            0 => (configure(paths, store, prompter, ui), "Configuration failed"),
            1 => (rollback(paths, store, prompter, ui), "Rollback failed"),
            2 => (commands::show(store, ui), "Failed to show configuration"),
            3 => (commands::backup_list(paths, store, ui), "Failed to list backups"),
            4 => (restore(paths, store, prompter, ui), "Failed to restore backup"),
            5 => (create_backup(paths, store, prompter, ui), "Failed to create backup"),
            _ => break,
        };
        if let Err(e) = result {
            ui.err(format!("{}: {:#}", failure, e));
        }
    }

    ui.info("Goodbye!");
    Ok(())
}

fn configure(paths: &Paths, store: &VariableStore, prompter: &dyn Prompter, ui: &Ui) -> Result<()> {
    let methods = vec![
        "Resource name (base URL is derived)".to_string(),
        "Full base URL".to_string(),
    ];
    let Some(method) = prompter.select("How do you want to identify the Foundry resource?", &methods)?
    else {
        ui.info("Configuration cancelled.");
        return Ok(());
    };

    let endpoint = if method == 0 {
        let resource = prompter.text("Azure Foundry resource name:", None)?;
        let resource = resource.trim();
        if resource.is_empty() {
            bail!("Resource name is required");
        }
        Endpoint::Resource(resource.to_string())
    } else {
        let url = prompter.text("Base URL (e.g. https://my-foundry.services.ai.azure.com/models):", None)?;
        let url = url.trim();
        if url.is_empty() {
            bail!("Base URL is required");
        }
        Endpoint::BaseUrl(url.to_string())
    };

    let api_key = prompter.password("API key:", "Leave empty to use Entra ID authentication")?;
    let mut cfg = FoundryConfig::new(endpoint).with_api_key(Some(api_key));
    cfg.sonnet_model = prompter.text("Sonnet model deployment name:", Some(DEFAULT_SONNET_MODEL))?;
    cfg.haiku_model = prompter.text("Haiku model deployment name:", Some(DEFAULT_HAIKU_MODEL))?;
    cfg.opus_model = prompter.text("Opus model deployment name:", Some(DEFAULT_OPUS_MODEL))?;
    cfg.validate()?;

    ui.newline();
    ui.section("Configuration Summary");
    match &cfg.endpoint {
        Endpoint::Resource(name) => ui.println(format!("  Resource: {}", name)),
        Endpoint::BaseUrl(url) => ui.println(format!("  Base URL: {}", url)),
    }
    match &cfg.api_key {
        Some(key) => ui.println(format!("  API key:  {} (masked)", mask_secret(key))),
        None => ui.println("  API key:  (Entra ID)"),
    }
    ui.println(format!("  Sonnet:   {}", cfg.sonnet_model));
    ui.println(format!("  Haiku:    {}", cfg.haiku_model));
    ui.println(format!("  Opus:     {}", cfg.opus_model));
    ui.newline();

    if !prompter.confirm("Apply this configuration?", true)? {
        ui.info("Configuration cancelled.");
        return Ok(());
    }
    commands::configure(paths, store, &cfg, ui)
}

fn rollback(paths: &Paths, store: &VariableStore, prompter: &dyn Prompter, ui: &Ui) -> Result<()> {
    ui.warn("This removes all Azure Foundry settings and returns to the direct Anthropic API.");
    if !prompter.confirm("Are you sure?", false)? {
        ui.info("Rollback cancelled.");
        return Ok(());
    }
    commands::rollback(paths, store, ui)
}

fn restore(paths: &Paths, store: &VariableStore, prompter: &dyn Prompter, ui: &Ui) -> Result<()> {
    let summaries = BackupStore::new(paths, store).list()?;
    if summaries.is_empty() {
        ui.info("No backups available to restore.");
        return Ok(());
    }

    let labels: Vec<String> = summaries
        .iter()
        .map(|s| {
            format!(
                "{}  {}",
                s.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"),
                s.description
            )
        })
        .collect();
    let Some(index) = prompter.select("Select a backup to restore:", &labels)? else {
        ui.info("Restore cancelled.");
        return Ok(());
    };
    let filename = &summaries[index].filename;

    if !prompter.confirm(&format!("Restore from '{}'?", filename), false)? {
        ui.info("Restore cancelled.");
        return Ok(());
    }
    commands::backup_restore(paths, store, filename, true, ui)
}

fn create_backup(paths: &Paths, store: &VariableStore, prompter: &dyn Prompter, ui: &Ui) -> Result<()> {
    let description = prompter.text("Backup description:", Some("Manual backup"))?;
    let description = description.trim();
    let description = if description.is_empty() { "Manual backup" } else { description };
    commands::backup_create(paths, store, description, ui)
}
