use crate::traits::{Tool, ToolError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one tool invocation as seen by the agent loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub text: String,
    pub success: bool,
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A registry holding only the named tools that exist here.
    pub fn subset(&self, names: &[&str]) -> ToolRegistry {
        let tools = names
            .iter()
            .filter_map(|name| self.tools.get(*name).map(|t| (name.to_string(), t.clone())))
            .collect();
        ToolRegistry { tools }
    }

    pub fn schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.schema()
                    }
                })
            })
            .collect()
    }

    /// Run a tool. Failures come back as text, never as an error.
    pub async fn invoke(&self, name: &str, args: Value) -> Observation {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "model requested unknown tool");
            return Observation {
                text: ToolError::NotFound(format!("tool '{name}'")).render(),
                success: false,
            };
        };

        match tool.execute(args).await {
            Ok(text) => {
                debug!(tool = name, "tool succeeded");
                Observation {
                    text,
                    success: true,
                }
            }
            Err(e) => {
                debug!(tool = name, error = %e, "tool failed");
                Observation {
                    text: e.render(),
                    success: false,
                }
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo back the input message"
        }

        fn schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            })
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            let message = crate::traits::required_str(&args, "message")?;
            Ok(format!("✅ {message}"))
        }
    }

    #[tokio::test]
    async fn test_invoke_renders_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let ok = registry.invoke("echo", json!({"message": "hi"})).await;
        assert!(ok.success);
        assert_eq!(ok.text, "✅ hi");

        let bad = registry.invoke("echo", json!({})).await;
        assert!(!bad.success);
        assert!(bad.text.starts_with("❌"));

        let missing = registry.invoke("nope", json!({})).await;
        assert!(!missing.success);
        assert!(missing.text.contains("nope"));
    }

    #[test]
    fn test_subset_and_schemas() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let narrowed = registry.subset(&["echo", "absent"]);
        assert_eq!(narrowed.list(), vec!["echo".to_string()]);
        assert!(registry.subset(&["absent"]).is_empty());

        let schemas = registry.schemas();
        assert_eq!(schemas[0]["function"]["name"], "echo");
        assert_eq!(schemas[0]["type"], "function");
    }
}
