use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Variables managed in the persistent store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarKey {
    UseFoundry,
    Resource,
    BaseUrl,
    ApiKey,
    SonnetModel,
    HaikuModel,
    OpusModel,
}

/// Current variable set, ordered by key declaration
pub type VarMap = BTreeMap<VarKey, String>;

impl VarKey {
    /// Every managed key, in block order
    pub fn all() -> [VarKey; 7] {
        [
            VarKey::UseFoundry,
            VarKey::Resource,
            VarKey::BaseUrl,
            VarKey::ApiKey,
            VarKey::SonnetModel,
            VarKey::HaikuModel,
            VarKey::OpusModel,
        ]
    }

    /// Environment variable name as seen by Claude Code
    pub fn env_name(&self) -> &'static str {
        match self {
            VarKey::UseFoundry => "CLAUDE_CODE_USE_FOUNDRY",
            VarKey::Resource => "ANTHROPIC_FOUNDRY_RESOURCE",
            VarKey::BaseUrl => "ANTHROPIC_FOUNDRY_BASE_URL",
            VarKey::ApiKey => "ANTHROPIC_FOUNDRY_API_KEY",
            VarKey::SonnetModel => "ANTHROPIC_DEFAULT_SONNET_MODEL",
            VarKey::HaikuModel => "ANTHROPIC_DEFAULT_HAIKU_MODEL",
            VarKey::OpusModel => "ANTHROPIC_DEFAULT_OPUS_MODEL",
        }
    }

    /// Get human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            VarKey::UseFoundry => "Foundry routing",
            VarKey::Resource => "Resource",
            VarKey::BaseUrl => "Base URL",
            VarKey::ApiKey => "API key",
            VarKey::SonnetModel => "Sonnet deployment",
            VarKey::HaikuModel => "Haiku deployment",
            VarKey::OpusModel => "Opus deployment",
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, VarKey::ApiKey)
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.env_name())
    }
}

impl FromStr for VarKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VarKey::all()
            .into_iter()
            .find(|k| k.env_name() == s)
            .ok_or_else(|| format!("Unknown variable: {}", s))
    }
}

/// Convert a typed set into plain `NAME -> value` pairs (snapshot format)
pub fn to_env_map(vars: &VarMap) -> BTreeMap<String, String> {
    vars.iter()
        .map(|(k, v)| (k.env_name().to_string(), v.clone()))
        .collect()
}

/// Convert `NAME -> value` pairs back into a typed set.
///
/// Names outside the managed set are dropped.
pub fn from_env_map(raw: &BTreeMap<String, String>) -> VarMap {
    let mut vars = VarMap::new();
    for (name, value) in raw {
        match name.parse::<VarKey>() {
            Ok(key) => {
                vars.insert(key, value.clone());
            }
            Err(_) => tracing::debug!(name = %name, "ignoring unmanaged variable"),
        }
    }
    vars
}

/// Whether a flag value reads as enabled
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}
