use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Unsafe action blocked: {0}")]
    Blocked(String),
    #[error("Timed out after {0} seconds")]
    Timeout(u64),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl ToolError {
    pub fn marker(&self) -> &'static str {
        match self {
            ToolError::Blocked(_) => "🚫",
            ToolError::Timeout(_) => "⏱️",
            _ => "❌",
        }
    }

    /// Observation text handed back to the model.
    pub fn render(&self) -> String {
        format!("{} {}", self.marker(), self)
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotFound(e.to_string()),
            std::io::ErrorKind::PermissionDenied => ToolError::PermissionDenied(e.to_string()),
            _ => ToolError::Execution(e.to_string()),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

pub(crate) fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args[field]
        .as_str()
        .ok_or_else(|| ToolError::Validation(format!("Missing '{field}' field")))
}

pub(crate) fn optional_str<'a>(args: &'a Value, field: &str) -> Option<&'a str> {
    args[field].as_str().filter(|s| !s.trim().is_empty())
}

/// Integers sometimes arrive as strings or floats from smaller models.
pub(crate) fn optional_i64(args: &Value, field: &str) -> Option<i64> {
    match &args[field] {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
