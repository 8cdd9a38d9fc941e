#![allow(dead_code)]

use async_trait::async_trait;
use deskpilot_providers::{
    GenerateResponse, LLMProvider, LoadError, LoadedModel, Message, ModelLoader, ProviderError,
    ProviderId, Tier, ToolCall,
};
use deskpilot_tools::{Tool, ToolError};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub type Reply = Result<GenerateResponse, ProviderError>;

pub fn text(content: &str) -> Reply {
    Ok(GenerateResponse {
        content: Some(content.to_string()),
        tool_calls: Vec::new(),
        finish_reason: "stop".to_string(),
    })
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> Reply {
    Ok(GenerateResponse {
        content: None,
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }],
        finish_reason: "tool_calls".to_string(),
    })
}

pub fn rate_limited() -> Reply {
    Err(ProviderError::RateLimited("too many requests".to_string()))
}

/// One generate call as seen by a provider.
#[derive(Debug, Clone)]
pub struct Call {
    pub provider: ProviderId,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        self.calls().iter().map(|c| c.provider).collect()
    }
}

struct ScriptedProvider {
    id: ProviderId,
    model: String,
    replies: Arc<Mutex<VecDeque<Reply>>>,
    log: CallLog,
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, messages: &[Message], tools: Option<&[Value]>) -> Reply {
        let tool_names = tools
            .unwrap_or_default()
            .iter()
            .filter_map(|t| t["function"]["name"].as_str().map(str::to_string))
            .collect();
        self.log.0.lock().unwrap().push(Call {
            provider: self.id,
            messages: messages.to_vec(),
            tool_names,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| text("done"))
    }

    fn name(&self) -> &str {
        self.id.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[derive(Clone, Copy)]
pub enum LoadFailure {
    MissingCredential,
    Unavailable,
}

/// Loader over scripted providers. Unscripted providers answer "done".
#[derive(Clone, Default)]
pub struct MockLoader {
    replies: HashMap<ProviderId, Arc<Mutex<VecDeque<Reply>>>>,
    failures: HashMap<ProviderId, LoadFailure>,
    limits: HashMap<ProviderId, usize>,
    pub log: CallLog,
}

impl MockLoader {
    pub fn new() -> Self {
        let mut loader = Self::default();
        for provider in ProviderId::ALL {
            loader.replies.insert(provider, Arc::default());
        }
        loader
    }

    pub fn script(self, provider: ProviderId, replies: Vec<Reply>) -> Self {
        self.replies[&provider].lock().unwrap().extend(replies);
        self
    }

    pub fn failing(mut self, provider: ProviderId, failure: LoadFailure) -> Self {
        self.failures.insert(provider, failure);
        self
    }

    pub fn limited(mut self, provider: ProviderId, max: usize) -> Self {
        self.limits.insert(provider, max);
        self
    }

    fn build(&self, provider: ProviderId, tier: Tier) -> LoadedModel {
        let model = format!("{provider}-{tier}");
        LoadedModel {
            provider,
            model: model.clone(),
            tier,
            handle: Box::new(ScriptedProvider {
                id: provider,
                model,
                replies: self.replies[&provider].clone(),
                log: self.log.clone(),
            }),
        }
    }
}

#[async_trait]
impl ModelLoader for MockLoader {
    async fn load(&self, provider: ProviderId, tier: Tier) -> Result<LoadedModel, LoadError> {
        match self.failures.get(&provider) {
            Some(LoadFailure::MissingCredential) => Err(LoadError::MissingCredential(provider)),
            Some(LoadFailure::Unavailable) => Err(LoadError::Unavailable {
                provider,
                reason: "connection refused".to_string(),
            }),
            None => Ok(self.build(provider, tier)),
        }
    }

    fn load_unprobed(&self, provider: ProviderId, tier: Tier) -> LoadedModel {
        self.build(provider, tier)
    }

    fn rate_limit(&self, provider: ProviderId) -> Option<usize> {
        self.limits.get(&provider).copied()
    }
}

/// Tool that records its arguments and answers with a fixed line.
pub struct RecordingTool {
    pub name: &'static str,
    pub seen: Arc<Mutex<Vec<Value>>>,
}

impl RecordingTool {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            seen: Arc::default(),
        }
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "records calls"
    }

    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        self.seen.lock().unwrap().push(args);
        Ok(format!("{} ok", self.name))
    }
}
