pub mod loader;
pub mod openai_compatible;
pub mod registry;
pub mod tiers;
pub mod traits;

pub use loader::{LoadError, LoadedModel, ModelLoader, ProviderLoader};
pub use openai_compatible::{GenerationOptions, OpenAICompatibleProvider};
pub use registry::{Credentials, ProviderDescriptor, ProviderFactory, ProviderId, ProviderRegistry};
pub use tiers::{Tier, TierTable};
pub use traits::{GenerateResponse, LLMProvider, Message, ProviderError, Role, ToolCall};
