use crate::metrics::UsageStats;
use crate::prompts::{directive_for, system_directive};
use crate::switcher::ModelSwitcher;
use deskpilot_providers::{LoadedModel, Message, ModelLoader, ProviderError, ProviderId};
use deskpilot_tools::{Observation, ToolRegistry, LOCAL_TOOL_NAMES};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_RECURSION_LIMIT: usize = 50;
pub const DEFAULT_MAX_RETRIES: usize = 3;

const SUSPICIOUS_MARKERS: &[&str] = &["limit", "throttl", "overloaded", "capacity", "503"];

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("gave up after {attempts} attempts, last error: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },
    #[error("step limit of {0} reached before the task finished")]
    StepLimit(usize),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Whether a provider error means "slow down / out of quota".
///
/// The structured 429 signal wins; otherwise the message is scanned for the
/// word "rate" or the markers "429" and "quota".
pub fn is_rate_related(error: &ProviderError) -> bool {
    if error.is_rate_limited() {
        return true;
    }

    let text = error.to_string().to_lowercase();
    text.contains("429")
        || text.contains("quota")
        || text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == "rate" || word.starts_with("ratelimit"))
}

fn looks_suspicious(error: &ProviderError) -> bool {
    let text = error.to_string().to_lowercase();
    SUSPICIOUS_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Receives progress while a task runs. All methods default to no-ops.
pub trait StepObserver: Send {
    fn on_thinking(&mut self, _text: &str) {}

    fn on_tool_call(&mut self, _name: &str, _args: &Value) {}

    fn on_tool_result(&mut self, _name: &str, _observation: &Observation) {}

    fn on_rate_limited(&mut self, _attempt: usize, _max_retries: usize, _error: &str) {}

    fn on_provider_switch(&mut self, _model: &LoadedModel) {}
}

/// Observer that ignores everything.
pub struct Silent;

impl StepObserver for Silent {}

#[derive(Debug, Clone, Copy)]
pub struct AgentConfig {
    pub recursion_limit: usize,
    pub max_retries: usize,
    pub compress_prompts: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            compress_prompts: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub answer: String,
    pub provider: ProviderId,
    pub model: String,
    pub steps: usize,
    pub tool_calls: usize,
    pub attempts: usize,
}

enum StepFailure {
    Provider(ProviderError),
    StepLimit,
}

struct Progress {
    steps: usize,
    tool_calls: usize,
}

/// Model → tools cycle driven against whatever model the switcher holds.
pub struct AgentLoop {
    tools: ToolRegistry,
    local_tools: ToolRegistry,
    config: AgentConfig,
    stats: Arc<UsageStats>,
}

impl AgentLoop {
    pub fn new(tools: ToolRegistry, config: AgentConfig, stats: Arc<UsageStats>) -> Self {
        let local_tools = tools.subset(LOCAL_TOOL_NAMES);
        Self {
            tools,
            local_tools,
            config,
            stats,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools_for(&self, provider: ProviderId) -> &ToolRegistry {
        if provider.is_local() {
            &self.local_tools
        } else {
            &self.tools
        }
    }

    /// Run `request` on top of `history`. Messages produced along the way are
    /// appended to `history` whether or not the task succeeds.
    pub async fn run<L: ModelLoader>(
        &self,
        switcher: &mut ModelSwitcher<L>,
        history: &mut Vec<Message>,
        request: &str,
        observer: &mut dyn StepObserver,
    ) -> Result<TaskOutcome, AgentError> {
        info!(request = %request, "starting task");
        history.push(Message::user(request));

        let max_retries = self.config.max_retries.max(1);
        let mut progress = Progress {
            steps: 0,
            tool_calls: 0,
        };
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match self.drive(switcher, history, request, &mut progress, observer).await {
                Ok(answer) => {
                    let model = switcher.ensure_loaded(request).await;
                    info!(
                        provider = %model.provider,
                        steps = progress.steps,
                        tool_calls = progress.tool_calls,
                        "task finished"
                    );
                    return Ok(TaskOutcome {
                        answer,
                        provider: model.provider,
                        model: model.model.clone(),
                        steps: progress.steps,
                        tool_calls: progress.tool_calls,
                        attempts: attempt,
                    });
                }
                Err(StepFailure::StepLimit) => {
                    warn!(limit = self.config.recursion_limit, "step limit reached");
                    return Err(AgentError::StepLimit(self.config.recursion_limit));
                }
                Err(StepFailure::Provider(e)) => e,
            };

            if !is_rate_related(&error) {
                if looks_suspicious(&error) {
                    warn!(error = %error, "unclassified provider error looks like throttling");
                }
                return Err(AgentError::Provider(error));
            }

            if attempt >= max_retries {
                warn!(attempts = attempt, error = %error, "rate limit retries exhausted");
                return Err(AgentError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let reason = error.to_string();
            observer.on_rate_limited(attempt, max_retries, &reason);
            let model = switcher.switch(&reason).await;
            self.stats.inc_provider_switches();
            info!(provider = %model.provider, model = %model.model, "resuming task on new provider");
            observer.on_provider_switch(model);
        }
    }

    /// One attempt: call the model until it answers without tool calls.
    async fn drive<L: ModelLoader>(
        &self,
        switcher: &mut ModelSwitcher<L>,
        transcript: &mut Vec<Message>,
        request: &str,
        progress: &mut Progress,
        observer: &mut dyn StepObserver,
    ) -> Result<String, StepFailure> {
        loop {
            if progress.steps >= self.config.recursion_limit {
                return Err(StepFailure::StepLimit);
            }

            let provider = switcher.ensure_loaded(request).await.provider;
            if !switcher.admit_current() {
                return Err(StepFailure::Provider(ProviderError::RateLimited(format!(
                    "local rate window full for {provider}"
                ))));
            }

            let directive = system_directive(provider, self.config.compress_prompts);
            if self.config.compress_prompts {
                self.stats
                    .record_compression(directive_for(provider), &directive);
            }
            let mut messages = Vec::with_capacity(transcript.len() + 1);
            messages.push(Message::system(directive));
            messages.extend(transcript.iter().cloned());

            let tools = self.tools_for(provider);
            let schemas = tools.schemas();

            progress.steps += 1;
            self.stats.inc_model_calls();
            debug!(step = progress.steps, provider = %provider, "calling model");
            let model = switcher.ensure_loaded(request).await;
            let response = model
                .handle
                .generate(&messages, Some(&schemas))
                .await
                .map_err(StepFailure::Provider)?;

            let content = response.content.unwrap_or_default();
            if !content.trim().is_empty() {
                observer.on_thinking(&content);
            }

            if response.tool_calls.is_empty() {
                transcript.push(Message::assistant(content.clone(), Vec::new()));
                return Ok(content);
            }

            transcript.push(Message::assistant(content, response.tool_calls.clone()));
            for call in response.tool_calls {
                observer.on_tool_call(&call.name, &call.arguments);
                let observation = tools.invoke(&call.name, call.arguments).await;
                progress.tool_calls += 1;
                self.stats.record_tool_call(observation.success);
                observer.on_tool_result(&call.name, &observation);
                transcript.push(Message::tool(call.id, observation.text));
            }
        }
    }
}
