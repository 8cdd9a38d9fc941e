use crate::config::Config;
use anyhow::{Context, Result};
use deskpilot_core::{AgentConfig, AgentLoop, Assistant, ModelSwitcher, TaskClassifier, UsageStats};
use deskpilot_memory::{LongTermMemory, ResponseCache};
use deskpilot_policy::{PermissionEngine, DEFAULT_WINDOW};
use deskpilot_providers::{ProviderLoader, ProviderRegistry};
use deskpilot_tools::standard_registry;
use std::sync::Arc;
use tracing::info;

pub const CACHE_FILE: &str = "cache.json";
pub const MEMORY_FILE: &str = "memory.json";

/// Everything the REPL needs for one session.
pub struct Session {
    pub assistant: Assistant<ProviderLoader>,
    pub registry: Arc<ProviderRegistry>,
}

pub fn build_session(config: &Config) -> Result<Session> {
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let permissions = Arc::new(PermissionEngine::new());
    let memory = Arc::new(LongTermMemory::new(data_dir.join(MEMORY_FILE)));
    let tools = standard_registry(permissions.clone(), memory);
    info!(tools = tools.len(), "tools registered");

    let registry = Arc::new(config.registry());
    let loader = ProviderLoader::new(registry.clone(), config.tier_table(), config.credentials());
    let classifier = TaskClassifier::new(config.default_tier, config.enable_smart_selection);
    let switcher = ModelSwitcher::new(
        loader,
        classifier,
        config.fallback_order.clone(),
        DEFAULT_WINDOW,
    );

    let stats = UsageStats::new();
    let agent = AgentLoop::new(
        tools,
        AgentConfig {
            recursion_limit: config.recursion_limit,
            max_retries: config.max_retries,
            compress_prompts: config.use_compressed_prompts,
        },
        stats.clone(),
    );

    let cache = if config.enable_caching {
        ResponseCache::new(data_dir.join(CACHE_FILE), config.cache_ttl())
    } else {
        ResponseCache::disabled()
    };

    Ok(Session {
        assistant: Assistant::new(switcher, agent, cache, permissions, stats),
        registry,
    })
}
