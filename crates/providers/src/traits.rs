use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Rate limited (429): {0}")]
    RateLimited(String),
}

impl ProviderError {
    /// Structured throttling signal from the remote service.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: String,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(
        &self,
        messages: &[Message],
        tools: Option<&[serde_json::Value]>,
    ) -> Result<GenerateResponse, ProviderError>;

    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Cheapest possible round trip, used as a liveness check before a
    /// handle is handed out.
    async fn probe(&self) -> Result<(), ProviderError> {
        self.generate(&[Message::user("test")], None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_message_carries_call_id() {
        let msg = Message::tool("call_1", "✅ done");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool");
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_rate_limited_is_structured() {
        assert!(ProviderError::RateLimited("slow down".into()).is_rate_limited());
        assert!(!ProviderError::Api {
            status: 500,
            body: "rate".into()
        }
        .is_rate_limited());
    }

    #[test]
    fn test_assistant_message_keeps_tool_calls() {
        let call = ToolCall {
            id: "call_9".into(),
            name: "list_directory".into(),
            arguments: json!({"directory_path": "~/Desktop"}),
        };
        let msg = Message::assistant("", vec![call.clone()]);
        assert_eq!(msg.tool_calls, vec![call]);
    }
}
