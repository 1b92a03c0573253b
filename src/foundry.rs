//! Azure AI Foundry routing configuration.
//!
//! Translates between the typed configuration a user asks for and the flat
//! variable set kept in the store. Switching on writes the routing flag, the
//! endpoint and the model deployments; switching off removes every managed
//! variable so Claude Code falls back to the direct Anthropic API.

use anyhow::{Context, Result, bail};

use crate::store::{ClearReport, VariableStore};
use crate::vars::{self, VarKey, VarMap};

pub const DEFAULT_SONNET_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_HAIKU_MODEL: &str = "claude-haiku-4-5";
pub const DEFAULT_OPUS_MODEL: &str = "claude-opus-4-1";

/// Where Foundry requests go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Azure resource name; the base URL is derived from it
    Resource(String),
    /// Full base URL supplied by the user
    BaseUrl(String),
}

/// Configuration applied when switching to Foundry routing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundryConfig {
    pub endpoint: Endpoint,
    /// `None` means Entra ID authentication
    pub api_key: Option<String>,
    pub sonnet_model: String,
    pub haiku_model: String,
    pub opus_model: String,
}

impl FoundryConfig {
    /// Config with the default model deployments and no API key
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            api_key: None,
            sonnet_model: DEFAULT_SONNET_MODEL.to_string(),
            haiku_model: DEFAULT_HAIKU_MODEL.to_string(),
            opus_model: DEFAULT_OPUS_MODEL.to_string(),
        }
    }

    /// Set the API key; blank input means Entra ID
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self
    }

    pub fn validate(&self) -> Result<()> {
        match &self.endpoint {
            Endpoint::Resource(name) => validate_resource_name(name)?,
            Endpoint::BaseUrl(url) => {
                if !url.starts_with("https://") || url.len() <= "https://".len() {
                    bail!("Invalid base URL '{}'.\nHint: The URL must start with https://", url);
                }
            }
        }
        for (label, model) in [
            ("Sonnet", &self.sonnet_model),
            ("Haiku", &self.haiku_model),
            ("Opus", &self.opus_model),
        ] {
            if model.trim().is_empty() {
                bail!("{} model deployment name cannot be empty", label);
            }
        }
        for (key, value) in self.to_vars() {
            if value.contains(['\n', '\r']) {
                bail!("{} cannot contain a line break", key.display_name());
            }
        }
        Ok(())
    }

    /// Variables this configuration sets
    pub fn to_vars(&self) -> VarMap {
        let mut vars = VarMap::new();
        vars.insert(VarKey::UseFoundry, "true".to_string());
        match &self.endpoint {
            Endpoint::Resource(name) => {
                vars.insert(VarKey::Resource, name.clone());
                vars.insert(VarKey::BaseUrl, base_url_for(name));
            }
            Endpoint::BaseUrl(url) => {
                vars.insert(VarKey::BaseUrl, url.clone());
            }
        }
        if let Some(key) = &self.api_key {
            vars.insert(VarKey::ApiKey, key.clone());
        }
        vars.insert(VarKey::SonnetModel, self.sonnet_model.clone());
        vars.insert(VarKey::HaikuModel, self.haiku_model.clone());
        vars.insert(VarKey::OpusModel, self.opus_model.clone());
        vars
    }
}

/// Base URL of a Foundry resource
pub fn base_url_for(resource: &str) -> String {
    format!("https://{}.services.ai.azure.com/models", resource)
}

/// Only allows ASCII alphanumerics and hyphens, as Azure does
pub fn validate_resource_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Resource name cannot be empty");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        bail!(
            "Invalid resource name '{}'.\n\n Only alphanumeric characters and hyphens (-) are allowed.",
            name
        );
    }
    Ok(())
}

/// Switch the store to Foundry routing
pub fn apply(store: &VariableStore, cfg: &FoundryConfig) -> Result<()> {
    cfg.validate()?;

    store
        .write_all(&cfg.to_vars())
        .context("Failed to write Foundry configuration")?;

    // Values from an earlier configuration that this one does not set
    let mut cleanup = Ok(());
    if cfg.api_key.is_none() {
        cleanup = store.delete(VarKey::ApiKey);
    }
    if cleanup.is_ok() && matches!(cfg.endpoint, Endpoint::BaseUrl(_)) {
        cleanup = store.delete(VarKey::Resource);
    }

    // The new values are already persisted, so announce them either way
    let notified = store
        .notify()
        .context("Configuration saved, but notifying running programs failed");
    cleanup.context("Configuration saved, but a value from the previous configuration could not be removed")?;
    notified?;
    tracing::info!(location = %store.location(), "foundry configuration applied");
    Ok(())
}

/// Remove all Foundry variables, returning to the direct Anthropic API
pub fn rollback(store: &VariableStore) -> Result<ClearReport> {
    let report = store.delete_all();
    store
        .notify()
        .context("Variables removed, but notifying running programs failed")?;
    tracing::info!(failed = report.failed.len(), "rolled back to default configuration");
    Ok(report)
}

/// Decoded view of the current store contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentConfig {
    pub use_foundry: bool,
    pub resource: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub sonnet_model: Option<String>,
    pub haiku_model: Option<String>,
    pub opus_model: Option<String>,
}

impl CurrentConfig {
    pub fn read(store: &VariableStore) -> Result<Self> {
        Ok(Self::from_vars(&store.read_all()?))
    }

    pub fn from_vars(vars: &VarMap) -> Self {
        let get = |key: VarKey| vars.get(&key).filter(|v| !v.is_empty()).cloned();
        Self {
            use_foundry: vars.get(&VarKey::UseFoundry).is_some_and(|v| vars::is_truthy(v)),
            resource: get(VarKey::Resource),
            base_url: get(VarKey::BaseUrl),
            api_key: get(VarKey::ApiKey),
            sonnet_model: get(VarKey::SonnetModel),
            haiku_model: get(VarKey::HaikuModel),
            opus_model: get(VarKey::OpusModel),
        }
    }
}

/// Show only the start of a secret
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "***".to_string();
    }
    let prefix: String = secret.chars().take(8).collect();
    format!("{}***", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryBackend, sample_vars};

    #[test]
    fn test_base_url_generation() {
        assert_eq!(
            base_url_for("my-foundry-resource"),
            "https://my-foundry-resource.services.ai.azure.com/models"
        );
    }

    #[test]
    fn test_apply_without_api_key_sets_six_variables() {
        let (store, state) = MemoryBackend::store();
        let cfg = FoundryConfig::new(Endpoint::Resource("acme".to_string()))
            .with_api_key(Some(String::new()));

        apply(&store, &cfg).unwrap();

        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 6);
        assert!(!all.contains_key(&VarKey::ApiKey));
        assert_eq!(all.get(&VarKey::UseFoundry).map(String::as_str), Some("true"));
        assert_eq!(
            all.get(&VarKey::BaseUrl).map(String::as_str),
            Some("https://acme.services.ai.azure.com/models")
        );
        assert_eq!(all.get(&VarKey::SonnetModel).map(String::as_str), Some(DEFAULT_SONNET_MODEL));
        assert_eq!(state.borrow().notifications, 1);
    }

    #[test]
    fn test_apply_clears_stale_values() {
        let (store, _) = MemoryBackend::store();
        store.write_all(&sample_vars()).unwrap();

        let cfg = FoundryConfig::new(Endpoint::BaseUrl("https://custom.example.com".to_string()));
        apply(&store, &cfg).unwrap();

        let current = CurrentConfig::read(&store).unwrap();
        assert!(current.use_foundry);
        assert_eq!(current.resource, None);
        assert_eq!(current.api_key, None);
        assert_eq!(current.base_url.as_deref(), Some("https://custom.example.com"));
    }

    #[test]
    fn test_apply_rejects_invalid_input_without_writing() {
        let (store, _) = MemoryBackend::store();

        let bad_name = FoundryConfig::new(Endpoint::Resource("bad name".to_string()));
        assert!(apply(&store, &bad_name).is_err());

        let bad_url = FoundryConfig::new(Endpoint::BaseUrl("http://plain.example.com".to_string()));
        assert!(apply(&store, &bad_url).is_err());

        let mut no_model = FoundryConfig::new(Endpoint::Resource("acme".to_string()));
        no_model.opus_model = "  ".to_string();
        assert!(apply(&store, &no_model).is_err());

        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_failed_stale_cleanup_still_notifies() {
        let (store, state) = MemoryBackend::store();
        store.write_all(&sample_vars()).unwrap();
        state.borrow_mut().fail_remove.insert(VarKey::ApiKey);

        let cfg = FoundryConfig::new(Endpoint::Resource("acme".to_string()));
        let err = apply(&store, &cfg).unwrap_err();

        assert!(format!("{:#}", err).contains("could not be removed"));
        assert_eq!(state.borrow().notifications, 1);
        assert!(CurrentConfig::read(&store).unwrap().use_foundry);
    }

    #[test]
    fn test_line_breaks_fail_validation() {
        let (store, _) = MemoryBackend::store();
        let mut cfg = FoundryConfig::new(Endpoint::Resource("acme".to_string()));
        cfg.haiku_model = "haiku\nexport EVIL=1".to_string();
        assert!(apply(&store, &cfg).is_err());

        let cfg = FoundryConfig::new(Endpoint::Resource("acme".to_string()))
            .with_api_key(Some("sk-\rkey".to_string()));
        assert!(apply(&store, &cfg).is_err());

        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_rollback_removes_everything_and_notifies_once() {
        let (store, state) = MemoryBackend::store();
        store.write_all(&sample_vars()).unwrap();

        let report = rollback(&store).unwrap();

        assert!(report.is_clean());
        assert!(store.read_all().unwrap().is_empty());
        assert_eq!(state.borrow().notifications, 1);
        assert_eq!(CurrentConfig::read(&store).unwrap(), CurrentConfig::default());
    }

    #[test]
    fn test_current_config_truthy_flag() {
        let mut vars = VarMap::new();
        vars.insert(VarKey::UseFoundry, "Yes".to_string());
        assert!(CurrentConfig::from_vars(&vars).use_foundry);

        vars.insert(VarKey::UseFoundry, "false".to_string());
        assert!(!CurrentConfig::from_vars(&vars).use_foundry);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("12345678"), "***");
        assert_eq!(mask_secret("sk-abcdefghijkl"), "sk-abcde***");
    }
}
