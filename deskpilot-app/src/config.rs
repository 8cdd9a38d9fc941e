use anyhow::{bail, Context, Result};
use deskpilot_providers::{Credentials, ProviderId, ProviderRegistry, Tier, TierTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.yaml";
pub const DATA_DIR: &str = ".deskpilot";

/// Written by `deskpilot config init`.
pub const CONFIG_TEMPLATE: &str = r#"# DeskPilot configuration. Every key is optional.

# API keys. GROQ_API_KEY / GEMINI_API_KEY in the environment take precedence.
groq_api_key: null
gemini_api_key: null

# Providers tried in order; the local model is always the last resort.
fallback_order: [groq, gemini, ollama]

# Requests per minute. null means unbounded. The local provider is never limited.
rate_limits:
  groq: 30
  gemini: 15

default_tier: medium
enable_smart_selection: true

enable_caching: true
cache_ttl_secs: 300

max_tokens_per_request: 2048
recursion_limit: 50
max_retries: 3
use_compressed_prompts: false

# Per-tier model overrides, e.g.
# model_tiers:
#   large:
#     groq: llama-3.3-70b-versatile
model_tiers: {}

ollama_base_url: http://localhost:11434/v1
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub groq: Option<usize>,
    pub gemini: Option<usize>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            groq: Some(30),
            gemini: Some(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub groq_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub fallback_order: Vec<ProviderId>,
    pub rate_limits: RateLimits,
    pub default_tier: Tier,
    pub enable_smart_selection: bool,
    pub enable_caching: bool,
    pub cache_ttl_secs: u64,
    pub max_tokens_per_request: u32,
    pub recursion_limit: usize,
    pub max_retries: usize,
    pub use_compressed_prompts: bool,
    pub model_tiers: HashMap<Tier, HashMap<ProviderId, String>>,
    pub ollama_base_url: String,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            gemini_api_key: None,
            fallback_order: ProviderId::ALL.to_vec(),
            rate_limits: RateLimits::default(),
            default_tier: Tier::Medium,
            enable_smart_selection: true,
            enable_caching: true,
            cache_ttl_secs: 300,
            max_tokens_per_request: 2048,
            recursion_limit: 50,
            max_retries: 3,
            use_compressed_prompts: false,
            model_tiers: HashMap::new(),
            ollama_base_url: deskpilot_providers::registry::OLLAMA_BASE_URL.to_string(),
            data_dir: None,
        }
    }
}

fn home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// `$DESKPILOT_CONFIG`, or `~/.deskpilot/config.yaml`.
    pub fn default_path() -> PathBuf {
        match std::env::var_os("DESKPILOT_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => home().join(DATA_DIR).join(CONFIG_FILE),
        }
    }

    /// Read the file (defaults when it does not exist), apply environment
    /// overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_blank("GROQ_API_KEY") {
            self.groq_api_key = Some(key);
        }
        if let Some(key) = non_blank("GEMINI_API_KEY") {
            self.gemini_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fallback_order.is_empty() {
            bail!("fallback_order must name at least one provider");
        }
        if self.recursion_limit == 0 {
            bail!("recursion_limit must be greater than zero");
        }
        if self.max_retries == 0 {
            bail!("max_retries must be greater than zero");
        }
        if self.max_tokens_per_request == 0 {
            bail!("max_tokens_per_request must be greater than zero");
        }
        if self.ollama_base_url.trim().is_empty() {
            bail!("ollama_base_url cannot be empty");
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| home().join(DATA_DIR))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new()
            .with(ProviderId::Groq, self.groq_api_key.clone())
            .with(ProviderId::Gemini, self.gemini_api_key.clone())
    }

    pub fn tier_table(&self) -> TierTable {
        let mut table = TierTable::new();
        for (tier, models) in &self.model_tiers {
            for (provider, model) in models {
                table.set_override(*tier, *provider, model.as_str());
            }
        }
        table
    }

    pub fn registry(&self) -> ProviderRegistry {
        ProviderRegistry::standard(self.max_tokens_per_request, &self.ollama_base_url)
            .with_rate_limit(ProviderId::Groq, self.rate_limits.groq)
            .with_rate_limit(ProviderId::Gemini, self.rate_limits.gemini)
    }

    /// Write the commented template unless a config already exists.
    pub fn write_template(path: &Path, force: bool) -> Result<bool> {
        if path.exists() && !force {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, CONFIG_TEMPLATE)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = Config::parse(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides_file_keys() {
        let mut config = Config::parse("groq_api_key: from-file\ngemini_api_key: g").unwrap();
        config.apply_env(|key| match key {
            "GROQ_API_KEY" => Some("from-env".to_string()),
            "GEMINI_API_KEY" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.groq_api_key.as_deref(), Some("from-env"));
        assert_eq!(config.gemini_api_key.as_deref(), Some("g"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config::parse("fallback_order: []").unwrap();
        assert!(config.validate().is_err());
        let config = Config::parse("max_retries: 0").unwrap();
        assert!(config.validate().is_err());
        let config = Config::parse("recursion_limit: 0").unwrap();
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }
}
