use crate::openai_compatible::{GenerationOptions, OpenAICompatibleProvider};
use crate::traits::LLMProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Groq,
    Gemini,
    #[serde(alias = "local")]
    Ollama,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Groq, ProviderId::Gemini, ProviderId::Ollama];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Groq => "groq",
            ProviderId::Gemini => "gemini",
            ProviderId::Ollama => "ollama",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            ProviderId::Groq => 0,
            ProviderId::Gemini => 1,
            ProviderId::Ollama => 2,
        }
    }

    /// The local provider needs no credential and has no rate ceiling.
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderId::Ollama)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(ProviderId::Groq),
            "gemini" => Ok(ProviderId::Gemini),
            "ollama" | "local" => Ok(ProviderId::Ollama),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Builds a live handle for one provider kind.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, model: &str, credential: Option<&str>) -> Box<dyn LLMProvider>;
}

pub struct OpenAICompatibleFactory {
    display_name: String,
    base_url: String,
    options: GenerationOptions,
}

impl OpenAICompatibleFactory {
    pub fn new(display_name: impl Into<String>, base_url: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            display_name: display_name.into(),
            base_url: base_url.into(),
            options,
        }
    }
}

impl ProviderFactory for OpenAICompatibleFactory {
    fn build(&self, model: &str, credential: Option<&str>) -> Box<dyn LLMProvider> {
        Box::new(
            OpenAICompatibleProvider::new(
                self.display_name.clone(),
                self.base_url.clone(),
                credential.map(str::to_string),
                model,
            )
            .with_options(self.options),
        )
    }
}

/// API keys by provider. Blank values count as absent.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: HashMap<ProviderId, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: ProviderId, key: Option<String>) -> Self {
        self.set(provider, key);
        self
    }

    pub fn set(&mut self, provider: ProviderId, key: Option<String>) {
        match key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            Some(key) => {
                self.keys.insert(provider, key);
            }
            None => {
                self.keys.remove(&provider);
            }
        }
    }

    pub fn get(&self, provider: ProviderId) -> Option<&str> {
        self.keys.get(&provider).map(String::as_str)
    }
}

#[derive(Clone)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub display_name: &'static str,
    pub icon: &'static str,
    pub cost_note: &'static str,
    pub requires_credential: bool,
    /// Requests per 60 s window; `None` is unbounded.
    pub rate_limit: Option<usize>,
    pub factory: Arc<dyn ProviderFactory>,
}

impl ProviderDescriptor {
    pub fn credential<'a>(&self, credentials: &'a Credentials) -> Option<&'a str> {
        if self.requires_credential {
            credentials.get(self.id)
        } else {
            None
        }
    }

    pub fn construct(&self, model: &str, credential: Option<&str>) -> Box<dyn LLMProvider> {
        self.factory.build(model, credential)
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("requires_credential", &self.requires_credential)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

/// One descriptor per `ProviderId`, so lookup never fails.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    descriptors: [ProviderDescriptor; 3],
}

impl ProviderRegistry {
    pub fn standard(max_tokens: u32, ollama_base_url: &str) -> Self {
        let options = GenerationOptions {
            max_tokens,
            ..GenerationOptions::default()
        };
        Self {
            descriptors: [
                ProviderDescriptor {
                    id: ProviderId::Groq,
                    display_name: "Groq (Cloud)",
                    icon: "⚡",
                    cost_note: "Free tier, 30 requests/min",
                    requires_credential: true,
                    rate_limit: Some(30),
                    factory: Arc::new(OpenAICompatibleFactory::new("Groq", GROQ_BASE_URL, options)),
                },
                ProviderDescriptor {
                    id: ProviderId::Gemini,
                    display_name: "Google Gemini",
                    icon: "✨",
                    cost_note: "Free tier, 15 requests/min",
                    requires_credential: true,
                    rate_limit: Some(15),
                    factory: Arc::new(OpenAICompatibleFactory::new("Gemini", GEMINI_BASE_URL, options)),
                },
                ProviderDescriptor {
                    id: ProviderId::Ollama,
                    display_name: "Ollama (Local)",
                    icon: "🏠",
                    cost_note: "Free, runs offline",
                    requires_credential: false,
                    rate_limit: None,
                    factory: Arc::new(OpenAICompatibleFactory::new("Ollama", ollama_base_url, options)),
                },
            ],
        }
    }

    pub fn descriptor(&self, id: ProviderId) -> &ProviderDescriptor {
        &self.descriptors[id.index()]
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.descriptors.iter()
    }

    pub fn with_factory(mut self, id: ProviderId, factory: Arc<dyn ProviderFactory>) -> Self {
        self.descriptors[id.index()].factory = factory;
        self
    }

    /// Ceilings are ignored for the local provider.
    pub fn with_rate_limit(mut self, id: ProviderId, limit: Option<usize>) -> Self {
        if !id.is_local() {
            self.descriptors[id.index()].rate_limit = limit;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_parse() {
        assert_eq!("local".parse::<ProviderId>().unwrap(), ProviderId::Ollama);
        assert_eq!(" Groq ".parse::<ProviderId>().unwrap(), ProviderId::Groq);
        assert!("openai".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_standard_registry_shape() {
        let registry = ProviderRegistry::standard(2048, OLLAMA_BASE_URL);
        for id in ProviderId::ALL {
            assert_eq!(registry.descriptor(id).id, id);
        }
        let ollama = registry.descriptor(ProviderId::Ollama);
        assert!(!ollama.requires_credential);
        assert_eq!(ollama.rate_limit, None);
        assert_eq!(registry.descriptor(ProviderId::Groq).rate_limit, Some(30));
        assert_eq!(registry.descriptor(ProviderId::Gemini).rate_limit, Some(15));
    }

    #[test]
    fn test_local_rate_limit_cannot_be_set() {
        let registry = ProviderRegistry::standard(2048, OLLAMA_BASE_URL)
            .with_rate_limit(ProviderId::Ollama, Some(1))
            .with_rate_limit(ProviderId::Groq, Some(5));
        assert_eq!(registry.descriptor(ProviderId::Ollama).rate_limit, None);
        assert_eq!(registry.descriptor(ProviderId::Groq).rate_limit, Some(5));
    }

    #[test]
    fn test_blank_credentials_are_absent() {
        let creds = Credentials::new()
            .with(ProviderId::Groq, Some("  ".into()))
            .with(ProviderId::Gemini, Some("key-123".into()));
        let registry = ProviderRegistry::standard(2048, OLLAMA_BASE_URL);
        assert_eq!(registry.descriptor(ProviderId::Groq).credential(&creds), None);
        assert_eq!(
            registry.descriptor(ProviderId::Gemini).credential(&creds),
            Some("key-123")
        );
    }

    #[test]
    fn test_factory_builds_named_handle() {
        let registry = ProviderRegistry::standard(512, "http://127.0.0.1:11434/v1");
        let handle = registry
            .descriptor(ProviderId::Ollama)
            .construct("llama3.2:3b", None);
        assert_eq!(handle.name(), "Ollama");
        assert_eq!(handle.model(), "llama3.2:3b");
    }
}
