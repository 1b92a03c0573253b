use anyhow::Result;
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use foundry_switch::{
    commands,
    foundry::{DEFAULT_HAIKU_MODEL, DEFAULT_OPUS_MODEL, DEFAULT_SONNET_MODEL, Endpoint, FoundryConfig},
    interactive::{self, InquirePrompter},
    logging,
    paths::Paths,
    store::VariableStore,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "foundry-switch")]
#[command(about = "Switch Claude Code between the Anthropic API and Azure AI Foundry")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Runs the interactive menu when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route Claude Code through Azure AI Foundry
    #[command(group(ArgGroup::new("endpoint").required(true).args(["resource", "base_url"])))]
    Configure {
        /// Azure Foundry resource name
        #[arg(long)]
        resource: Option<String>,

        /// Full base URL instead of a resource name
        #[arg(long)]
        base_url: Option<String>,

        /// API key; omit to use Entra ID authentication
        #[arg(long)]
        api_key: Option<String>,

        #[arg(long, default_value = DEFAULT_SONNET_MODEL)]
        sonnet_model: String,

        #[arg(long, default_value = DEFAULT_HAIKU_MODEL)]
        haiku_model: String,

        #[arg(long, default_value = DEFAULT_OPUS_MODEL)]
        opus_model: String,
    },

    /// Remove all Foundry settings and use the Anthropic API directly
    Rollback,

    /// Show the current configuration
    Show,

    /// Manage configuration backups
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Run diagnostics
    Doctor,

    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// List backups, newest first
    List,

    /// Save the current configuration
    Create {
        /// Description stored with the backup
        #[arg(default_value = "Manual backup")]
        description: String,
    },

    /// Replace the current configuration with a backup
    Restore {
        /// Backup file name, as shown by `backup list`
        file: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete a backup
    Delete {
        file: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the variables saved in a backup
    Show {
        file: String,
    },

    /// Delete all but the newest backups
    Prune {
        /// Number of backups to keep
        #[arg(long, default_value_t = 10)]
        keep: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    let ui = Ui::new(cli.color, cli.no_color);

    if let Err(e) = logging::init_logging(cli.verbose, ui.color_enabled) {
        ui.warn(format!("{:#}", e));
    }

    if let Err(e) = run(cli, &ui) {
        ui.err(format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli, ui: &Ui) -> Result<()> {
    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "foundry-switch", &mut std::io::stdout());
        return Ok(());
    }

    let paths = Paths::new()?;
    let store = VariableStore::for_host(&paths);
    tracing::debug!(location = %store.location(), "using variable store");

    let Some(command) = cli.command else {
        return interactive::run(&paths, &store, &InquirePrompter, ui);
    };

    match command {
        Commands::Configure {
            resource,
            base_url,
            api_key,
            sonnet_model,
            haiku_model,
            opus_model,
        } => {
            let endpoint = match (resource, base_url) {
                (Some(resource), _) => Endpoint::Resource(resource),
                (None, Some(url)) => Endpoint::BaseUrl(url),
                (None, None) => anyhow::bail!("Either --resource or --base-url is required"),
            };
            let mut cfg = FoundryConfig::new(endpoint).with_api_key(api_key);
            cfg.sonnet_model = sonnet_model;
            cfg.haiku_model = haiku_model;
            cfg.opus_model = opus_model;
            commands::configure(&paths, &store, &cfg, ui)
        }
        Commands::Rollback => commands::rollback(&paths, &store, ui),
        Commands::Show => commands::show(&store, ui),
        Commands::Backup(backup) => match backup {
            BackupCommands::List => commands::backup_list(&paths, &store, ui),
            BackupCommands::Create { description } => {
                commands::backup_create(&paths, &store, &description, ui)
            }
            BackupCommands::Restore { file, yes } => {
                commands::backup_restore(&paths, &store, &file, yes, ui)
            }
            BackupCommands::Delete { file, yes } => {
                commands::backup_delete(&paths, &store, &file, yes, ui)
            }
            BackupCommands::Show { file } => commands::backup_show(&paths, &store, &file, ui),
            BackupCommands::Prune { keep } => commands::backup_prune(&paths, &store, keep, ui),
        },
        Commands::Doctor => commands::doctor(&paths, &store, ui),
        Commands::Completions { .. } => Ok(()),
    }
}
