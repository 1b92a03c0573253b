use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Shell families that get a dedicated startup file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Zsh,
    Bash,
    Fish,
    Posix,
}

impl ShellKind {
    /// Classify a `$SHELL` value such as `/usr/bin/zsh`
    pub fn from_shell_var(shell: Option<&str>) -> Self {
        let name = shell
            .and_then(|s| Path::new(s).file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        if name.contains("zsh") {
            Self::Zsh
        } else if name.contains("bash") {
            Self::Bash
        } else if name.contains("fish") {
            Self::Fish
        } else {
            Self::Posix
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Zsh => "zsh",
            Self::Bash => "bash",
            Self::Fish => "fish",
            Self::Posix => "sh",
        }
    }
}

/// All computed paths used by foundry-switch
#[derive(Debug, Clone)]
pub struct Paths {
    /// The invoking user's home directory
    pub home: PathBuf,
    /// ~/.claude-code-backups
    pub backups_dir: PathBuf,
    /// Shell detected from $SHELL at startup
    pub shell: ShellKind,
}

impl Paths {
    pub fn new() -> Result<Self> {
        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        let shell = std::env::var("SHELL").ok();
        Ok(Self::with_home(base_dirs.home_dir(), ShellKind::from_shell_var(shell.as_deref())))
    }

    /// Build paths rooted at an explicit home directory
    pub fn with_home(home: &Path, shell: ShellKind) -> Self {
        Self {
            home: home.to_path_buf(),
            backups_dir: home.join(".claude-code-backups"),
            shell,
        }
    }

    /// The single shell startup file that holds the managed block.
    ///
    /// bash prefers an existing ~/.bash_profile (macOS login shells) and
    /// falls back to ~/.bashrc.
    pub fn shell_profile(&self) -> PathBuf {
        match self.shell {
            ShellKind::Zsh => self.home.join(".zshrc"),
            ShellKind::Bash => {
                let bash_profile = self.home.join(".bash_profile");
                if bash_profile.exists() {
                    bash_profile
                } else {
                    self.home.join(".bashrc")
                }
            }
            ShellKind::Fish => self.home.join(".config").join("fish").join("config.fish"),
            ShellKind::Posix => self.home.join(".profile"),
        }
    }

    /// Path of a named snapshot inside the backups directory
    pub fn backup_file(&self, filename: &str) -> PathBuf {
        self.backups_dir.join(filename)
    }

    /// Ensure the backups directory exists
    pub fn ensure_backups_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.backups_dir).with_context(|| {
            format!("Failed to create backup directory: {:?}", self.backups_dir)
        })
    }
}
