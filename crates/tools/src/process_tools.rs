use crate::backend::{ensure_safe, run_shell};
use crate::traits::{optional_i64, required_str, Tool, ToolError};
use async_trait::async_trait;
use deskpilot_policy::PermissionEngine;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::task;

pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ExecuteTerminalCommandTool {
    permissions: Arc<PermissionEngine>,
    timeout: Duration,
}

impl ExecuteTerminalCommandTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self {
            permissions,
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for ExecuteTerminalCommandTool {
    fn name(&self) -> &str {
        "execute_terminal_command"
    }

    fn description(&self) -> &str {
        "Run a shell command (30s timeout), e.g. 'mkdir ~/Desktop/Images', 'ls -la', 'mv *.jpg Images/'. \
         Dangerous commands are blocked"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string" }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let command = required_str(&args, "command")?;
        if command.trim().is_empty() {
            return Err(ToolError::Validation("command cannot be empty".to_string()));
        }
        ensure_safe(&self.permissions, command)?;

        let output = run_shell(command, self.timeout).await?;
        let text = output.text().trim_end();
        if output.code == 0 {
            let text = if text.is_empty() {
                "Command completed with no output."
            } else {
                text
            };
            Ok(format!("✅ Command executed successfully:\n{text}"))
        } else {
            Ok(format!(
                "⚠️ Command failed with exit code {}:\n{text}",
                output.code
            ))
        }
    }
}

pub struct CheckRunningAppsTool;

fn running_process_names() -> Vec<String> {
    let mut system = System::new();
    system.refresh_processes();
    let names: BTreeSet<String> = system
        .processes()
        .values()
        .map(|process| process.name().to_string())
        .filter(|name| !name.is_empty() && !name.starts_with("kworker"))
        .collect();
    names.into_iter().collect()
}

#[async_trait]
impl Tool for CheckRunningAppsTool {
    fn name(&self) -> &str {
        "check_running_apps"
    }

    fn description(&self) -> &str {
        "List running programs, useful to check whether an app is already open before launching it"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filter": { "type": "string", "description": "Only names containing this text" },
                "limit": { "type": "integer", "default": 60 }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let filter = args["filter"].as_str().map(|f| f.trim().to_lowercase());
        let limit = optional_i64(&args, "limit").unwrap_or(60).max(1) as usize;

        let names = task::spawn_blocking(running_process_names)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let shown: Vec<String> = names
            .into_iter()
            .filter(|name| match &filter {
                Some(f) if !f.is_empty() => name.to_lowercase().contains(f.as_str()),
                _ => true,
            })
            .take(limit)
            .collect();

        if shown.is_empty() {
            return Ok("No matching apps detected.".to_string());
        }
        Ok(format!("🔍 Running apps:\n{}", shown.join("\n")))
    }
}

pub struct VerifyExpectationsTool {
    permissions: Arc<PermissionEngine>,
}

impl VerifyExpectationsTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for VerifyExpectationsTool {
    fn name(&self) -> &str {
        "verify_expectations"
    }

    fn description(&self) -> &str {
        "Check that expected changes really happened by running a verification shell command"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "what_to_verify": { "type": "string", "description": "e.g. 8 JPG files in ~/Desktop/Images/" },
                "verification_commands": { "type": "string", "description": "e.g. ls ~/Desktop/Images/*.jpg" }
            },
            "required": ["what_to_verify", "verification_commands"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let expected = required_str(&args, "what_to_verify")?;
        let command = required_str(&args, "verification_commands")?;
        ensure_safe(&self.permissions, command)?;

        let output = run_shell(command, VERIFY_TIMEOUT).await?;
        let text = output.text().trim_end();

        let verdict = match (output.code == 0, text.trim().is_empty()) {
            (true, false) => "✅ VERIFICATION PASSED\n   Expected conditions met!",
            (true, true) => "⚠️ VERIFICATION INCONCLUSIVE\n   No output - might be empty",
            (false, _) => "❌ VERIFICATION FAILED\n   Expected conditions NOT met!",
        };

        Ok(format!(
            "🔍 VERIFICATION REPORT\n\n📋 Expected:\n   {expected}\n\n🔧 Verification Command:\n   {command}\n\n📊 Actual Result:\n{text}\n\n{verdict}"
        ))
    }
}
