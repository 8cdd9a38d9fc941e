//! Tools that only shape the model's own reasoning. None of them touch the system.

use crate::traits::{optional_str, required_str, Tool, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

const CRITICAL_ACTIONS: &[&str] = &["moved", "copied", "deleted", "created", "modified", "organized"];

const FOLDER_HINTS: &[(&[&str], &str)] = &[
    (&[".jpg", ".jpeg", ".png", ".gif"], "Images"),
    (&[".pdf", ".doc", ".txt"], "Documents"),
    (&[".mp4", ".mov", ".avi"], "Videos"),
    (&[".mp3", ".wav", ".flac"], "Audio"),
    (&[".zip", ".rar", ".7z"], "Archives"),
];

/// Share of critical verbs in the expected outcome that also appear in the
/// actions summary. 50 when the expectation names none.
pub fn completion_percent(actions_summary: &str, expected_outcome: &str) -> f64 {
    let done_words: Vec<String> = actions_summary
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let expected_words: Vec<String> = expected_outcome
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let count = |words: &[String]| {
        CRITICAL_ACTIONS
            .iter()
            .filter(|action| words.iter().any(|w| w.as_str() == **action))
            .count()
    };

    let needed = count(&expected_words);
    if needed == 0 {
        return 50.0;
    }
    count(&done_words) as f64 / needed as f64 * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Permission,
    NotFound,
    AlreadyExists,
    DirectoryMismatch,
    DiskSpace,
    General,
}

impl ErrorCategory {
    pub fn classify(error_message: &str) -> Self {
        let lower = error_message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["permission denied", "operation not permitted"]) {
            ErrorCategory::Permission
        } else if has(&["command not found", "no such file or directory"]) {
            ErrorCategory::NotFound
        } else if has(&["already exists", "file exists"]) {
            ErrorCategory::AlreadyExists
        } else if has(&["is a directory", "is not a directory"]) {
            ErrorCategory::DirectoryMismatch
        } else if has(&["no space", "disk full"]) {
            ErrorCategory::DiskSpace
        } else {
            ErrorCategory::General
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ErrorCategory::Permission => "PERMISSION ERROR",
            ErrorCategory::NotFound => "COMMAND/FILE NOT FOUND",
            ErrorCategory::AlreadyExists => "FILE/FOLDER ALREADY EXISTS",
            ErrorCategory::DirectoryMismatch => "DIRECTORY/FILE MISMATCH",
            ErrorCategory::DiskSpace => "DISK SPACE ERROR",
            ErrorCategory::General => "GENERAL ERROR",
        }
    }

    /// Alternatives, most promising first.
    fn strategies(&self) -> &'static [&'static str] {
        match self {
            ErrorCategory::Permission => &[
                "Use a different location such as ~/Desktop or ~/Documents instead of system folders",
                "Inspect permissions with 'ls -la <path>' and, if safe, 'chmod u+w <path>'",
                "Use absolute paths like ~/path/to/file instead of relative ones",
                "Check ownership with 'ls -l <path>' and make sure it is your file",
                "Create the item under ~/ first, then copy it to the destination",
            ],
            ErrorCategory::NotFound => &[
                "Try an alternative command (wget → curl, python → python3)",
                "Check the path exists first with list_directory()",
                "Use absolute paths such as ~/Desktop/file.txt",
                "Check whether the tool is installed with 'which <command>'",
                "Locate the file with search_file()",
            ],
            ErrorCategory::AlreadyExists => &[
                "Check existence first with list_directory() before creating",
                "Use a different name, e.g. add a date or a number suffix",
                "Remove the old item first if that is safe",
                "Use a force flag carefully (this overwrites)",
                "Merge into the existing folder instead of creating a new one",
            ],
            ErrorCategory::DirectoryMismatch => &[
                "Check what the path actually is with list_directory() on its parent",
                "Use the right command: cat/mv/cp for files, cd/mkdir for directories",
                "Re-check the path for typos in folder names",
            ],
            ErrorCategory::DiskSpace => &[
                "Check free space with 'df -h'",
                "Clean up temporary files and empty the trash",
                "Use a different location or drive",
            ],
            ErrorCategory::General => &[
                "Read the error message carefully for specific hints",
                "Verify inputs: paths exist and parameters are correct",
                "Break the command into smaller steps and test each one",
                "Check context with get_current_directory()",
                "Try a completely different approach",
            ],
        }
    }
}

pub struct PlanTaskTool;

#[async_trait]
impl Tool for PlanTaskTool {
    fn name(&self) -> &str {
        "plan_task"
    }

    fn description(&self) -> &str {
        "Think through a task before acting: break it into steps based on what you have observed so far"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_description": { "type": "string" },
                "observations": { "type": "string", "description": "What you learned so far, e.g. Desktop has 3 .jpg and 2 .pdf files" }
            },
            "required": ["task_description"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let task = required_str(&args, "task_description")?;
        let observations = optional_str(&args, "observations");

        let mut plan = format!("🎯 TASK PLANNING ANALYSIS\n{RULE}\n\n📋 User Request: {task}\n\n");
        match observations {
            Some(seen) => {
                let lower = seen.to_lowercase();
                plan.push_str(&format!("🔍 Current Observations:\n   {seen}\n\n"));
                plan.push_str("💡 Based on what I see, I should:\n");
                plan.push_str("   1. Only create folders for file types that actually exist\n");
                plan.push_str("   2. Group similar file types logically\n");

                let folders: Vec<&str> = FOLDER_HINTS
                    .iter()
                    .filter(|(exts, _)| exts.iter().any(|ext| lower.contains(ext)))
                    .map(|(_, folder)| *folder)
                    .collect();
                if !folders.is_empty() {
                    plan.push_str("\n   Recommended folders:\n");
                    for folder in folders {
                        plan.push_str(&format!("   → {folder}\n"));
                    }
                }
            }
            None => {
                plan.push_str("🔍 No observations yet.\n\n");
                plan.push_str("💡 Step 1: gather information with list_directory()\n");
                plan.push_str("   Step 2: call plan_task() again with observations\n");
            }
        }
        plan.push_str(&format!("\n{RULE}\n✅ Adapt to the actual situation."));
        Ok(plan)
    }
}

pub struct SelfCritiqueTool;

#[async_trait]
impl Tool for SelfCritiqueTool {
    fn name(&self) -> &str {
        "self_critique"
    }

    fn description(&self) -> &str {
        "Evaluate honestly whether the task is really complete before reporting done"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "original_task": { "type": "string" },
                "actions_summary": { "type": "string" },
                "expected_outcome": { "type": "string" }
            },
            "required": ["original_task", "actions_summary", "expected_outcome"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let task = required_str(&args, "original_task")?;
        let actions = required_str(&args, "actions_summary")?;
        let expected = required_str(&args, "expected_outcome")?;

        let completion = completion_percent(actions, expected);
        let (status, advice) = if completion < 50.0 {
            ("🔴 INCOMPLETE", "Major gaps detected, continue working. Do not say done yet.")
        } else if completion < 90.0 {
            ("🟡 PARTIAL", "Some steps are missing. Identify them and complete them.")
        } else {
            ("🟢 COMPLETE", "Verify the results once more, then report completion.")
        };

        Ok(format!(
            "🔍 SELF-CRITIQUE ANALYSIS\n{RULE}\n\n📋 Original Task:\n   {task}\n\n✅ Actions Taken:\n   {actions}\n\n🎯 Expected:\n   {expected}\n\n{status} ({completion:.0}%)\n💡 {advice}"
        ))
    }
}

pub struct DebugLastErrorTool;

#[async_trait]
impl Tool for DebugLastErrorTool {
    fn name(&self) -> &str {
        "debug_last_error"
    }

    fn description(&self) -> &str {
        "Analyze a failure and get ranked alternative strategies to try next"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "error_message": { "type": "string" },
                "command_that_failed": { "type": "string" },
                "context": { "type": "string" }
            },
            "required": ["error_message", "command_that_failed"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let error = required_str(&args, "error_message")?;
        let command = required_str(&args, "command_that_failed")?;
        let context = optional_str(&args, "context").unwrap_or("No context provided");

        let category = ErrorCategory::classify(error);
        let strategies = category.strategies();
        let ranked: Vec<String> = strategies
            .iter()
            .enumerate()
            .map(|(i, s)| format!("   {}. {} {s}", i + 1, "⭐".repeat(5 - i.min(4))))
            .collect();

        Ok(format!(
            "🐛 ERROR DEBUGGING REPORT\n{RULE}\n\n❌ ERROR: {error}\n🔧 FAILED COMMAND: {command}\n📋 CONTEXT: {context}\n\n🔍 Type: {}\n\n🔄 ALTERNATIVE STRATEGIES (try in order):\n{}\n\n💡 If a strategy works, save it with save_to_memory(..., \"success\").",
            category.title(),
            ranked.join("\n")
        ))
    }
}
