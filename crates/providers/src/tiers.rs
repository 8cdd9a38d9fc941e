use crate::registry::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Small,
    #[default]
    Medium,
    Large,
}

pub const SIMPLE_KEYWORDS: &[&str] = &[
    "list", "show", "what", "check", "get", "current", "see", "display",
];

pub const COMPLEX_KEYWORDS: &[&str] = &[
    "debug",
    "error",
    "fix",
    "recover",
    "analyze",
    "explain",
    "why",
    "troubleshoot",
];

pub const MULTISTEP_KEYWORDS: &[&str] =
    &["organize", "create and", "move all", "setup", "configure"];

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Small, Tier::Medium, Tier::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Small => "small",
            Tier::Medium => "medium",
            Tier::Large => "large",
        }
    }

    /// Task keywords associated with this tier.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Tier::Small => SIMPLE_KEYWORDS,
            Tier::Medium => MULTISTEP_KEYWORDS,
            Tier::Large => COMPLEX_KEYWORDS,
        }
    }

    fn index(&self) -> usize {
        match self {
            Tier::Small => 0,
            Tier::Medium => 1,
            Tier::Large => 2,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "small" => Ok(Tier::Small),
            "medium" => Ok(Tier::Medium),
            "large" => Ok(Tier::Large),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

// Rows are tiers, columns follow ProviderId::ALL.
const DEFAULT_MODELS: [[&str; 3]; 3] = [
    ["llama-3.1-8b-instant", "gemini-2.0-flash-lite", "llama3.2:3b"],
    ["llama-3.3-70b-versatile", "gemini-2.0-flash", "llama3.1:8b"],
    ["llama-3.3-70b-versatile", "gemini-2.0-flash-exp", "llama3.1:8b"],
];

/// Per-tier model names for every provider. Lookup is total: an override
/// wins, otherwise the built-in default is used.
#[derive(Debug, Clone, Default)]
pub struct TierTable {
    overrides: HashMap<(Tier, ProviderId), String>,
}

impl TierTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, tier: Tier, provider: ProviderId, model: impl Into<String>) -> Self {
        self.set_override(tier, provider, model);
        self
    }

    pub fn set_override(&mut self, tier: Tier, provider: ProviderId, model: impl Into<String>) {
        let model = model.into();
        if model.trim().is_empty() {
            return;
        }
        self.overrides.insert((tier, provider), model);
    }

    pub fn model_for(&self, tier: Tier, provider: ProviderId) -> &str {
        self.overrides
            .get(&(tier, provider))
            .map(String::as_str)
            .unwrap_or(DEFAULT_MODELS[tier.index()][provider.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tier_resolves_for_every_provider() {
        let table = TierTable::new();
        for tier in Tier::ALL {
            for provider in ProviderId::ALL {
                assert!(!table.model_for(tier, provider).is_empty());
            }
        }
        assert_eq!(table.model_for(Tier::Small, ProviderId::Groq), "llama-3.1-8b-instant");
        assert_eq!(table.model_for(Tier::Large, ProviderId::Gemini), "gemini-2.0-flash-exp");
        assert_eq!(table.model_for(Tier::Small, ProviderId::Ollama), "llama3.2:3b");
    }

    #[test]
    fn test_override_wins_and_blank_is_ignored() {
        let table = TierTable::new()
            .with_override(Tier::Medium, ProviderId::Ollama, "qwen2.5:7b")
            .with_override(Tier::Large, ProviderId::Groq, "  ");
        assert_eq!(table.model_for(Tier::Medium, ProviderId::Ollama), "qwen2.5:7b");
        assert_eq!(table.model_for(Tier::Large, ProviderId::Groq), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("LARGE".parse::<Tier>().unwrap(), Tier::Large);
        assert!("huge".parse::<Tier>().is_err());
        assert_eq!(Tier::default(), Tier::Medium);
    }
}
