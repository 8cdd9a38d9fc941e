use crate::traits::{optional_str, required_str, Tool, ToolError};
use async_trait::async_trait;
use deskpilot_memory::{LongTermMemory, MemoryBank, MemoryError, MemoryKind};
use serde_json::{json, Value};
use std::sync::Arc;

const RECENT_LIMIT: usize = 5;
const SECTION_LIMIT: usize = 10;

impl From<MemoryError> for ToolError {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::InvalidKind(_) => ToolError::Validation(e.to_string()),
            other => ToolError::Execution(other.to_string()),
        }
    }
}

fn bullet_lines(entries: &[(&str, &str)]) -> String {
    entries
        .iter()
        .map(|(key, value)| format!("   • {key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn last_n<'a>(entries: Vec<(&'a str, &'a str)>, n: usize) -> Vec<(&'a str, &'a str)> {
    let skip = entries.len().saturating_sub(n);
    entries.into_iter().skip(skip).collect()
}

fn render_all(bank: &MemoryBank) -> String {
    if bank.is_empty() {
        return "📚 Memory is empty - nothing learned yet!".to_string();
    }

    let mut out = format!("📚 MEMORY BANK ({} total memories)\n", bank.total());
    let sections = [
        (MemoryKind::Preference, "👤 USER PREFERENCES:", usize::MAX),
        (MemoryKind::Fact, "📋 FACTS:", usize::MAX),
        (MemoryKind::Mistake, "⚠️ MISTAKES TO AVOID (last 5):", RECENT_LIMIT),
        (MemoryKind::Success, "✅ SUCCESSFUL STRATEGIES (last 5):", RECENT_LIMIT),
    ];
    for (kind, heading, limit) in sections {
        let entries = last_n(bank.entries(kind), limit);
        if !entries.is_empty() {
            out.push_str(&format!("\n{heading}\n{}\n", bullet_lines(&entries)));
        }
    }
    out
}

pub struct SaveToMemoryTool {
    memory: Arc<LongTermMemory>,
}

impl SaveToMemoryTool {
    pub fn new(memory: Arc<LongTermMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for SaveToMemoryTool {
    fn name(&self) -> &str {
        "save_to_memory"
    }

    fn description(&self) -> &str {
        "Save something to permanent memory: a user preference, a fact, a mistake to avoid or a strategy that worked"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Short identifier, e.g. user_path_preference" },
                "value": { "type": "string" },
                "memory_type": {
                    "type": "string",
                    "enum": ["preference", "fact", "mistake", "success"],
                    "default": "fact"
                }
            },
            "required": ["key", "value"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let key = required_str(&args, "key")?.trim();
        let value = required_str(&args, "value")?;
        if key.is_empty() {
            return Err(ToolError::Validation("key cannot be empty".to_string()));
        }
        let kind: MemoryKind = optional_str(&args, "memory_type").unwrap_or("fact").parse()?;

        self.memory.remember(kind, key, value).await?;
        Ok(format!("💾 Saved to memory [{kind}]: {key} = {value}"))
    }
}

pub struct RecallFromMemoryTool {
    memory: Arc<LongTermMemory>,
}

impl RecallFromMemoryTool {
    pub fn new(memory: Arc<LongTermMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for RecallFromMemoryTool {
    fn name(&self) -> &str {
        "recall_from_memory"
    }

    fn description(&self) -> &str {
        "Recall from permanent memory: 'all', a section (preferences, facts, mistakes, successes) or a keyword"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "default": "all" }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let query = optional_str(&args, "query").unwrap_or("all").trim();
        let bank = self.memory.load().await;

        if query.eq_ignore_ascii_case("all") {
            return Ok(render_all(&bank));
        }

        if let Some(kind) = MemoryKind::ALL
            .into_iter()
            .find(|kind| kind.section().eq_ignore_ascii_case(query))
        {
            let entries = last_n(bank.entries(kind), SECTION_LIMIT);
            return Ok(format!(
                "{}:\n{}",
                kind.section().to_uppercase(),
                bullet_lines(&entries)
            ));
        }

        let hits = bank.search(query);
        if hits.is_empty() {
            return Err(ToolError::NotFound(format!("no memories about '{query}'")));
        }
        let lines: Vec<String> = hits
            .iter()
            .map(|(kind, key, value)| format!("[{}] {key}: {value}", kind.label()))
            .collect();
        Ok(format!(
            "🔍 Found {} memories about '{query}':\n\n{}",
            hits.len(),
            lines.join("\n")
        ))
    }
}

pub struct ClearMemoryTool {
    memory: Arc<LongTermMemory>,
}

impl ClearMemoryTool {
    pub fn new(memory: Arc<LongTermMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for ClearMemoryTool {
    fn name(&self) -> &str {
        "clear_memory"
    }

    fn description(&self) -> &str {
        "Clear permanent memory: 'all' or one section (preferences, facts, mistakes, successes). Use carefully"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "memory_type": { "type": "string", "default": "all" }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let scope = optional_str(&args, "memory_type").unwrap_or("all").trim();
        if scope.eq_ignore_ascii_case("all") {
            self.memory.clear(None).await?;
            return Ok("🗑️ Cleared ALL memory".to_string());
        }

        let kind: MemoryKind = scope.parse()?;
        self.memory.clear(Some(kind)).await?;
        Ok(format!("🗑️ Cleared {}", kind.section()))
    }
}
