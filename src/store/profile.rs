//! Shell profile backend.
//!
//! The managed variables live in one marked block inside the user's shell
//! startup file:
//!
//! ```text
//! # >>> Claude Foundry Manager - BEGIN >>>
//! # Claude Code Azure Foundry configuration
//! # Managed by foundry-switch - edits inside this block are overwritten
//! export CLAUDE_CODE_USE_FOUNDRY="true"
//! export ANTHROPIC_FOUNDRY_RESOURCE="acme"
//! # <<< Claude Foundry Manager - END <<<
//! ```
//!
//! Every change re-reads the file, edits the parsed map, and regenerates the
//! whole block. Lines outside the block are passed through untouched, except
//! the single blank line that separates the block from them. An empty map
//! removes the block instead of leaving bare markers.
//!
//! Markers only count when they make up the whole line. Values are written as
//! one double-quoted line, so line breaks are rejected.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use super::Backend;
use crate::fs_utils::{atomic_write, read_optional, resolve_link};
use crate::vars::{VarKey, VarMap};

pub const MARKER_BEGIN: &str = "# >>> Claude Foundry Manager - BEGIN >>>";
pub const MARKER_END: &str = "# <<< Claude Foundry Manager - END <<<";

const BLOCK_HEADER: [&str; 2] = [
    "# Claude Code Azure Foundry configuration",
    "# Managed by foundry-switch - edits inside this block are overwritten",
];

/// Double-quote escaping rules of the target shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    #[default]
    Posix,
    /// fish only escapes `\`, `"` and `$` inside double quotes
    Fish,
}

impl Quoting {
    pub fn for_path(path: &Path) -> Self {
        if path.extension().is_some_and(|ext| ext == "fish") {
            Self::Fish
        } else {
            Self::Posix
        }
    }

    fn escape(self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            let special = match self {
                Self::Posix => matches!(c, '\\' | '"' | '$' | '`'),
                Self::Fish => matches!(c, '\\' | '"' | '$'),
            };
            if special {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }
}

/// A shell startup file split into passthrough lines and the managed variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDocument {
    /// Lines outside the block, in original order
    pub outside: Vec<String>,
    /// Variables parsed from the block
    pub vars: VarMap,
    /// Whether the file contained a block at all
    pub has_block: bool,
}

impl ProfileDocument {
    pub fn parse(content: &str) -> Result<Self> {
        let mut doc = Self::default();
        let mut in_block = false;

        for (idx, line) in content.lines().enumerate() {
            if line.trim() == MARKER_BEGIN {
                if in_block {
                    bail!("Nested begin marker on line {}", idx + 1);
                }
                in_block = true;
                doc.has_block = true;
                // Separator written in front of the block
                if doc.outside.last().is_some_and(|l| l.trim().is_empty()) {
                    doc.outside.pop();
                }
                continue;
            }
            if line.trim() == MARKER_END {
                if !in_block {
                    bail!("End marker without begin marker on line {}", idx + 1);
                }
                in_block = false;
                continue;
            }

            if !in_block {
                doc.outside.push(line.to_string());
                continue;
            }

            if let Some((name, value)) = parse_export(line) {
                match name.parse::<VarKey>() {
                    Ok(key) => {
                        doc.vars.insert(key, value);
                    }
                    Err(_) => tracing::debug!(name, "ignoring unmanaged export in block"),
                }
            }
        }

        if in_block {
            bail!("Managed block is missing its end marker");
        }

        Ok(doc)
    }

    /// Render the file: passthrough lines, then a fresh block if any variables remain
    pub fn render(&self, quoting: Quoting) -> String {
        let mut lines: Vec<String> = self.outside.clone();

        if !self.vars.is_empty() {
            if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                lines.push(String::new());
            }
            lines.push(MARKER_BEGIN.to_string());
            lines.extend(BLOCK_HEADER.iter().map(|l| l.to_string()));
            for (key, value) in &self.vars {
                lines.push(format!("export {}=\"{}\"", key.env_name(), quoting.escape(value)));
            }
            lines.push(MARKER_END.to_string());
        }

        if lines.is_empty() {
            return String::new();
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Editor for the managed block of one shell startup file
#[derive(Debug, Clone)]
pub struct ProfileBackend {
    path: PathBuf,
}

impl ProfileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the current file; a missing file is an empty document
    pub fn document(&self) -> Result<Option<ProfileDocument>> {
        let target = resolve_link(&self.path);
        match read_optional(&target)? {
            Some(content) => ProfileDocument::parse(&content)
                .map(Some)
                .map_err(|e| e.context(format!("Malformed profile {:?}", target))),
            None => Ok(None),
        }
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut VarMap),
    {
        let existing = self.document()?;
        let file_exists = existing.is_some();
        let mut doc = existing.unwrap_or_default();

        let before = doc.vars.clone();
        f(&mut doc.vars);
        // An empty marker pair still has to be cleared out
        let stale_block = doc.has_block && doc.vars.is_empty();
        if doc.vars == before && !stale_block {
            return Ok(());
        }
        if !file_exists && doc.vars.is_empty() {
            return Ok(());
        }

        let target = resolve_link(&self.path);
        tracing::debug!(path = ?target, count = doc.vars.len(), "rewriting profile block");
        atomic_write(&target, doc.render(Quoting::for_path(&target)).as_bytes())
    }
}

impl Backend for ProfileBackend {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn get(&self, key: VarKey) -> Result<Option<String>> {
        Ok(self.load()?.remove(&key))
    }

    fn load(&self) -> Result<VarMap> {
        Ok(self.document()?.map(|doc| doc.vars).unwrap_or_default())
    }

    fn merge(&self, vars: &VarMap) -> Result<()> {
        for (key, value) in vars {
            if value.contains(['\n', '\r']) {
                bail!("Value for {} contains a line break, which a shell profile cannot hold", key);
            }
        }
        self.update(|current| {
            for (key, value) in vars {
                current.insert(*key, value.clone());
            }
        })
    }

    fn remove(&self, key: VarKey) -> Result<()> {
        self.update(|current| {
            current.remove(&key);
        })
    }

    /// New shells pick the block up on start; there is nothing to signal
    fn notify(&self) -> Result<()> {
        Ok(())
    }
}

/// Parse `export NAME="value"` into its name and unquoted value
fn parse_export(line: &str) -> Option<(&str, String)> {
    let rest = line.trim().strip_prefix("export")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (name, raw) = rest.split_once('=')?;
    Some((name.trim(), unquote(raw.trim())))
}

fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let inner = &raw[1..raw.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                    continue;
                }
            }
            out.push(c);
        }
        out
    } else if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VariableStore;
    use crate::test_utils::sample_vars;
    use std::fs;
    use tempfile::TempDir;

    fn backend(temp_dir: &TempDir) -> ProfileBackend {
        ProfileBackend::new(temp_dir.path().join(".zshrc"))
    }

    fn block_count(content: &str) -> usize {
        content.lines().filter(|l| l.trim() == MARKER_BEGIN).count()
    }

    #[test]
    fn test_write_preserves_surrounding_lines() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);
        fs::write(backend.path(), "alias ll='ls -l'\nexport PATH=\"$HOME/bin:$PATH\"\n").unwrap();

        let store = VariableStore::new(Box::new(backend.clone()));
        store.write(VarKey::Resource, "acme").unwrap();

        let content = fs::read_to_string(backend.path()).unwrap();
        assert!(content.starts_with("alias ll='ls -l'\nexport PATH=\"$HOME/bin:$PATH\"\n\n"));
        assert!(content.contains("export ANTHROPIC_FOUNDRY_RESOURCE=\"acme\""));
        assert!(content.trim_end().ends_with(MARKER_END));
    }

    #[test]
    fn test_write_keeps_other_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = VariableStore::new(Box::new(backend(&temp_dir)));
        store.write_all(&sample_vars()).unwrap();

        store.write(VarKey::HaikuModel, "haiku-custom").unwrap();

        let all = store.read_all().unwrap();
        assert_eq!(all.len(), sample_vars().len());
        assert_eq!(all.get(&VarKey::HaikuModel).map(String::as_str), Some("haiku-custom"));
        assert_eq!(all.get(&VarKey::Resource).map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_removing_block_rejoins_surrounding_lines() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);
        let original = format!(
            "line one\n{}\nexport ANTHROPIC_FOUNDRY_RESOURCE=\"old\"\n{}\nline two\n",
            MARKER_BEGIN, MARKER_END
        );
        fs::write(backend.path(), original).unwrap();

        backend.remove(VarKey::Resource).unwrap();
        assert_eq!(fs::read_to_string(backend.path()).unwrap(), "line one\nline two\n");
    }

    #[test]
    fn test_removing_last_key_drops_block() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);
        fs::write(backend.path(), "# my zshrc\n").unwrap();

        backend.merge(&[(VarKey::Resource, "acme".to_string())].into()).unwrap();
        backend.remove(VarKey::Resource).unwrap();

        assert_eq!(fs::read_to_string(backend.path()).unwrap(), "# my zshrc\n");
    }

    #[test]
    fn test_empty_marker_pair_is_cleared() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);
        fs::write(backend.path(), format!("echo hi\n\n{}\n{}\n", MARKER_BEGIN, MARKER_END)).unwrap();

        let store = VariableStore::new(Box::new(backend.clone()));
        assert!(store.delete_all().is_clean());

        assert_eq!(fs::read_to_string(backend.path()).unwrap(), "echo hi\n");
    }

    #[test]
    fn test_line_breaks_are_rejected_without_writing() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);
        let store = VariableStore::new(Box::new(backend.clone()));
        store.write(VarKey::Resource, "acme").unwrap();
        let before = fs::read_to_string(backend.path()).unwrap();

        let err = store.write(VarKey::SonnetModel, "a\nb").unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_DEFAULT_SONNET_MODEL"));
        assert!(store.write(VarKey::HaikuModel, "a\rb").is_err());

        assert_eq!(fs::read_to_string(backend.path()).unwrap(), before);
        assert_eq!(store.read(VarKey::SonnetModel).unwrap(), None);
    }

    #[test]
    fn test_marker_text_inside_a_value_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = VariableStore::new(Box::new(backend(&temp_dir)));
        store.write(VarKey::Resource, "acme").unwrap();

        store.write(VarKey::HaikuModel, MARKER_END).unwrap();
        store.write(VarKey::OpusModel, MARKER_BEGIN).unwrap();

        assert_eq!(store.read(VarKey::Resource).unwrap().as_deref(), Some("acme"));
        assert_eq!(store.read(VarKey::HaikuModel).unwrap().as_deref(), Some(MARKER_END));
        assert_eq!(store.read(VarKey::OpusModel).unwrap().as_deref(), Some(MARKER_BEGIN));
        assert!(store.delete_all().is_clean());
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_fish_leaves_backticks_alone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.fish");
        let backend = ProfileBackend::new(path.clone());
        let value = r#"x`y"$z"#;

        backend.merge(&[(VarKey::ApiKey, value.to_string())].into()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(r#"export ANTHROPIC_FOUNDRY_API_KEY="x`y\"\$z""#));
        assert_eq!(backend.get(VarKey::ApiKey).unwrap().as_deref(), Some(value));
    }

    #[test]
    fn test_write_all_empty_leaves_no_block() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);
        fs::write(backend.path(), "echo hi\n").unwrap();

        backend.merge(&VarMap::new()).unwrap();

        let content = fs::read_to_string(backend.path()).unwrap();
        assert_eq!(block_count(&content), 0);
        assert_eq!(content, "echo hi\n");
    }

    #[test]
    fn test_missing_file_is_not_created_by_delete() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);

        backend.remove(VarKey::ApiKey).unwrap();
        assert!(!backend.path().exists());
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn test_repeated_writes_are_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);
        fs::write(backend.path(), "export EDITOR=vim\n").unwrap();

        backend.merge(&sample_vars()).unwrap();
        let first = fs::read_to_string(backend.path()).unwrap();
        backend.merge(&[(VarKey::OpusModel, "other".to_string())].into()).unwrap();
        backend.merge(&[(VarKey::OpusModel, "claude-opus-4-1".to_string())].into()).unwrap();
        let second = fs::read_to_string(backend.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(block_count(&second), 1);
    }

    #[test]
    fn test_values_are_escaped_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);
        let tricky = r#"a"b$c`d\e"#;

        backend.merge(&[(VarKey::ApiKey, tricky.to_string())].into()).unwrap();

        let content = fs::read_to_string(backend.path()).unwrap();
        assert!(content.contains(r#"export ANTHROPIC_FOUNDRY_API_KEY="a\"b\$c\`d\\e""#));
        assert_eq!(backend.get(VarKey::ApiKey).unwrap().as_deref(), Some(tricky));
    }

    #[test]
    fn test_parse_ignores_noise_inside_block() {
        let content = format!(
            "{}\n# comment\n\nexport UNRELATED=\"x\"\nexport CLAUDE_CODE_USE_FOUNDRY=true\nexportFOO=1\n{}\n",
            MARKER_BEGIN, MARKER_END
        );
        let doc = ProfileDocument::parse(&content).unwrap();
        assert!(doc.has_block);
        assert!(doc.outside.is_empty());
        assert_eq!(doc.vars.len(), 1);
        assert_eq!(doc.vars.get(&VarKey::UseFoundry).map(String::as_str), Some("true"));
    }

    #[test]
    fn test_unterminated_block_is_an_error_and_file_is_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let backend = backend(&temp_dir);
        let original = format!("keep me\n{}\nexport CLAUDE_CODE_USE_FOUNDRY=\"true\"\nmore\n", MARKER_BEGIN);
        fs::write(backend.path(), &original).unwrap();

        assert!(backend.merge(&sample_vars()).is_err());
        assert_eq!(fs::read_to_string(backend.path()).unwrap(), original);
    }

    #[test]
    fn test_fish_config_directory_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".config/fish/config.fish");
        let backend = ProfileBackend::new(path.clone());

        backend.merge(&sample_vars()).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_profile_keeps_link() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("dotfiles-zshrc");
        let link = temp_dir.path().join(".zshrc");
        fs::write(&real, "# dotfiles\n").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        ProfileBackend::new(link.clone()).merge(&sample_vars()).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(fs::read_to_string(&real).unwrap().contains(MARKER_BEGIN));
    }
}
