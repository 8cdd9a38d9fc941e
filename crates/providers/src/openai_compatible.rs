use crate::traits::*;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 2048,
            top_p: 0.9,
        }
    }
}

/// Chat-completions client for any backend speaking the OpenAI wire format.
/// Groq, Gemini and Ollama all expose such an endpoint.
pub struct OpenAICompatibleProvider {
    client: Client,
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    options: GenerationOptions,
}

impl OpenAICompatibleProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(&self, messages: &[Message], tools: Option<&[Value]>) -> Value {
        let wire: Vec<Value> = messages.iter().map(to_wire).collect();
        let mut body = json!({
            "model": self.model,
            "messages": wire,
            "temperature": self.options.temperature,
            "max_tokens": self.options.max_tokens,
            "top_p": self.options.top_p,
        });

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = json!(tools);
        }
        body
    }
}

fn to_wire(message: &Message) -> Value {
    let mut value = json!({
        "role": message.role,
        "content": message.content,
    });

    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                })
            })
            .collect();
        value["tool_calls"] = Value::Array(calls);
    }

    if let Some(id) = &message.tool_call_id {
        value["tool_call_id"] = json!(id);
    }
    value
}

fn parse_response(json: &Value) -> Result<GenerateResponse, ProviderError> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    let message = &choice["message"];
    let content = message["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    let finish_reason = choice["finish_reason"]
        .as_str()
        .unwrap_or("stop")
        .to_string();

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .filter_map(|(index, call)| {
                    let name = call["function"]["name"].as_str()?.to_string();
                    // Some backends send arguments as an object rather than a string.
                    let arguments = match &call["function"]["arguments"] {
                        Value::String(raw) if raw.trim().is_empty() => json!({}),
                        Value::String(raw) => serde_json::from_str(raw).ok()?,
                        Value::Null => json!({}),
                        other => other.clone(),
                    };
                    let id = call["id"]
                        .as_str()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("call_{index}"));
                    Some(ToolCall {
                        id,
                        name,
                        arguments,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(GenerateResponse {
        content,
        tool_calls,
        finish_reason,
    })
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
    ) -> Result<GenerateResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(messages, tools);

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        debug!(provider = %self.name, model = %self.model, messages = messages.len(), "chat completion");

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::RateLimited(text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_response(&json)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}
