//! Diagnostic logging through `tracing`.
//!
//! Logs go to stderr so they never mix with command output. `RUST_LOG` wins
//! when set; otherwise the level follows the number of `-v` flags.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Filter directive for a `-v` count
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "foundry_switch=info",
        _ => "foundry_switch=debug",
    }
}

/// Install the global subscriber
///
/// # Errors
/// - If a global subscriber is already installed
pub fn init_logging(verbosity: u8, ansi: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(ansi),
        )
        .try_init()
        .map_err(|e| anyhow!("Logging already initialized: {}", e))?;

    tracing::debug!("logging initialized");
    Ok(())
}
