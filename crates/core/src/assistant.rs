use crate::agent_loop::{AgentError, AgentLoop, StepObserver, TaskOutcome};
use crate::conversation::ConversationStore;
use crate::metrics::UsageStats;
use crate::switcher::{ModelSwitcher, SwitchError};
use deskpilot_memory::ResponseCache;
use deskpilot_policy::{PermissionEngine, PermissionResult};
use deskpilot_providers::{LoadedModel, ModelLoader, ProviderId};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_THREAD: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Rejected by the safety gate before any model call.
    Blocked { pattern: String },
    Cached(String),
    Completed(TaskOutcome),
}

/// One interactive session: safety gate, response cache, conversation
/// history and the agent loop over a single model switcher.
pub struct Assistant<L: ModelLoader> {
    switcher: ModelSwitcher<L>,
    agent: AgentLoop,
    cache: ResponseCache,
    permissions: Arc<PermissionEngine>,
    conversations: ConversationStore,
    thread_id: String,
    stats: Arc<UsageStats>,
}

impl<L: ModelLoader> Assistant<L> {
    pub fn new(
        switcher: ModelSwitcher<L>,
        agent: AgentLoop,
        cache: ResponseCache,
        permissions: Arc<PermissionEngine>,
        stats: Arc<UsageStats>,
    ) -> Self {
        Self {
            switcher,
            agent,
            cache,
            permissions,
            conversations: ConversationStore::default(),
            thread_id: DEFAULT_THREAD.to_string(),
            stats,
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    pub fn with_conversations(mut self, conversations: ConversationStore) -> Self {
        self.conversations = conversations;
        self
    }

    pub fn switcher(&self) -> &ModelSwitcher<L> {
        &self.switcher
    }

    pub fn switcher_mut(&mut self) -> &mut ModelSwitcher<L> {
        &mut self.switcher
    }

    pub fn stats(&self) -> &Arc<UsageStats> {
        &self.stats
    }

    pub fn history_len(&self) -> usize {
        self.conversations.len(&self.thread_id)
    }

    /// Load a model for the default tier before the first request arrives.
    pub async fn start(&mut self) -> &LoadedModel {
        self.switcher.acquire("").await
    }

    pub async fn switch_to(&mut self, provider: ProviderId) -> Result<&LoadedModel, SwitchError> {
        self.switcher.switch_to(provider).await
    }

    pub async fn handle(
        &mut self,
        request: &str,
        observer: &mut dyn StepObserver,
    ) -> Result<RequestOutcome, AgentError> {
        if let PermissionResult::Denied(pattern) = self.permissions.check(request) {
            warn!(pattern = %pattern, "request blocked by safety gate");
            self.stats.inc_blocked_requests();
            return Ok(RequestOutcome::Blocked { pattern });
        }

        self.stats.inc_requests();
        if let Some(response) = self.cache.lookup(request).await {
            debug!("answered from cache");
            self.stats.record_cache_hit(&response);
            return Ok(RequestOutcome::Cached(response));
        }

        let mut history = self.conversations.history(&self.thread_id).to_vec();
        let result = self
            .agent
            .run(&mut self.switcher, &mut history, request, observer)
            .await;
        self.conversations.save(&self.thread_id, history);

        let outcome = result?;
        // Only tool-free answers are cached.
        if outcome.tool_calls == 0 && !outcome.answer.trim().is_empty() {
            self.cache.store(request, &outcome.answer).await;
        }
        Ok(RequestOutcome::Completed(outcome))
    }
}
