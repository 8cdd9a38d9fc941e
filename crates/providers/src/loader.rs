use crate::registry::{Credentials, ProviderDescriptor, ProviderId, ProviderRegistry};
use crate::tiers::{Tier, TierTable};
use crate::traits::LLMProvider;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing credential for {0}")]
    MissingCredential(ProviderId),
    #[error("{provider} unavailable: {reason}")]
    Unavailable { provider: ProviderId, reason: String },
}

impl LoadError {
    pub fn provider(&self) -> ProviderId {
        match self {
            LoadError::MissingCredential(provider) => *provider,
            LoadError::Unavailable { provider, .. } => *provider,
        }
    }
}

/// A constructed handle together with what it was built for.
pub struct LoadedModel {
    pub provider: ProviderId,
    pub model: String,
    pub tier: Tier,
    pub handle: Box<dyn LLMProvider>,
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("tier", &self.tier)
            .finish()
    }
}

#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Construct and probe. No retries.
    async fn load(&self, provider: ProviderId, tier: Tier) -> Result<LoadedModel, LoadError>;

    /// Construct without probing. Only meaningful for the local fallback.
    fn load_unprobed(&self, provider: ProviderId, tier: Tier) -> LoadedModel;

    /// Requests per window for the provider, `None` when unbounded.
    fn rate_limit(&self, provider: ProviderId) -> Option<usize>;
}

pub struct ProviderLoader {
    registry: Arc<ProviderRegistry>,
    tiers: TierTable,
    credentials: Credentials,
}

impl ProviderLoader {
    pub fn new(registry: Arc<ProviderRegistry>, tiers: TierTable, credentials: Credentials) -> Self {
        Self {
            registry,
            tiers,
            credentials,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn descriptor(&self, provider: ProviderId) -> &ProviderDescriptor {
        self.registry.descriptor(provider)
    }

    fn construct(&self, provider: ProviderId, tier: Tier) -> Result<LoadedModel, LoadError> {
        let descriptor = self.registry.descriptor(provider);
        let credential = descriptor.credential(&self.credentials);
        if descriptor.requires_credential && credential.is_none() {
            return Err(LoadError::MissingCredential(provider));
        }

        let model = self.tiers.model_for(tier, provider).to_string();
        let handle = descriptor.construct(&model, credential);
        Ok(LoadedModel {
            provider,
            model,
            tier,
            handle,
        })
    }
}

#[async_trait]
impl ModelLoader for ProviderLoader {
    async fn load(&self, provider: ProviderId, tier: Tier) -> Result<LoadedModel, LoadError> {
        let loaded = self.construct(provider, tier)?;
        debug!(provider = %provider, model = %loaded.model, "probing provider");

        if let Err(e) = loaded.handle.probe().await {
            warn!(provider = %provider, error = %e, "liveness probe failed");
            return Err(LoadError::Unavailable {
                provider,
                reason: e.to_string(),
            });
        }

        info!(provider = %provider, model = %loaded.model, tier = %tier, "provider loaded");
        Ok(loaded)
    }

    fn load_unprobed(&self, provider: ProviderId, tier: Tier) -> LoadedModel {
        let descriptor = self.registry.descriptor(provider);
        let model = self.tiers.model_for(tier, provider).to_string();
        let handle = descriptor.construct(&model, descriptor.credential(&self.credentials));
        LoadedModel {
            provider,
            model,
            tier,
            handle,
        }
    }

    fn rate_limit(&self, provider: ProviderId) -> Option<usize> {
        self.registry.descriptor(provider).rate_limit
    }
}
