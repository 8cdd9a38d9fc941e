use crate::backend::{ensure_safe, expand_home, home_dir};
use crate::traits::{optional_i64, optional_str, required_str, Tool, ToolError};
use async_trait::async_trait;
use deskpilot_policy::PermissionEngine;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

const MAX_SEARCH_RESULTS: usize = 50;
const MAX_SEARCH_DIRS: usize = 20_000;

pub struct SearchFileTool {
    permissions: Arc<PermissionEngine>,
}

impl SearchFileTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for SearchFileTool {
    fn name(&self) -> &str {
        "search_file"
    }

    fn description(&self) -> &str {
        "Find files with an exact name, searching recursively from a start directory (default: home)"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": { "type": "string" },
                "start_dir": { "type": "string", "default": "~" }
            },
            "required": ["filename"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let filename = required_str(&args, "filename")?.trim();
        if filename.is_empty() || filename.contains('/') {
            return Err(ToolError::Validation(
                "filename must be a bare file name".to_string(),
            ));
        }
        ensure_safe(&self.permissions, filename)?;

        let start = optional_str(&args, "start_dir")
            .map(expand_home)
            .unwrap_or_else(home_dir);
        if !start.is_dir() {
            return Err(ToolError::NotFound(format!(
                "start directory {}",
                start.display()
            )));
        }

        let mut matches = Vec::new();
        let mut pending = vec![start];
        let mut visited = 0;

        // Unreadable directories are skipped.
        while let Some(dir) = pending.pop() {
            visited += 1;
            if visited > MAX_SEARCH_DIRS || matches.len() >= MAX_SEARCH_RESULTS {
                break;
            }
            let Ok(mut entries) = fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if entry.file_name().to_string_lossy() == filename {
                    matches.push(entry.path());
                }
            }
        }

        if matches.is_empty() {
            return Err(ToolError::NotFound(format!("file '{filename}'")));
        }
        matches.sort();
        let listing: Vec<String> = matches
            .iter()
            .map(|p| format!("   • {}", p.display()))
            .collect();
        Ok(format!(
            "🔍 Found {} match(es) for '{filename}':\n{}",
            matches.len(),
            listing.join("\n")
        ))
    }
}

pub struct GetCurrentDirectoryTool;

#[async_trait]
impl Tool for GetCurrentDirectoryTool {
    fn name(&self) -> &str {
        "get_current_directory"
    }

    fn description(&self) -> &str {
        "Get the current working directory"
    }

    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> Result<String, ToolError> {
        let cwd = std::env::current_dir()?;
        Ok(format!("📁 Current directory: {}", cwd.display()))
    }
}

pub struct ReadFileContentTool {
    permissions: Arc<PermissionEngine>,
}

impl ReadFileContentTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for ReadFileContentTool {
    fn name(&self) -> &str {
        "read_file_content"
    }

    fn description(&self) -> &str {
        "Read the first lines of a text file (default 50 lines)"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filepath": { "type": "string" },
                "max_lines": { "type": "integer", "default": 50, "minimum": 1 }
            },
            "required": ["filepath"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let filepath = required_str(&args, "filepath")?;
        ensure_safe(&self.permissions, filepath)?;
        let max_lines = optional_i64(&args, "max_lines").unwrap_or(50).max(1) as usize;

        let path = expand_home(filepath);
        let bytes = fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotFound(format!("file {filepath}")),
            _ => ToolError::from(e),
        })?;
        let content = String::from_utf8_lossy(&bytes);

        let total = content.lines().count();
        let shown: Vec<&str> = content.lines().take(max_lines).collect();
        let truncated = if total > max_lines { " (truncated)" } else { "" };
        Ok(format!(
            "📄 Content of {filepath}{truncated}:\n{}",
            shown.join("\n")
        ))
    }
}

pub struct ListDirectoryTool {
    permissions: Arc<PermissionEngine>,
}

impl ListDirectoryTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and folders in a directory with sizes and a summary of file types. \
         Use this before organizing files so you act on what actually exists"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory_path": { "type": "string", "description": "e.g. ~/Desktop" }
            },
            "required": ["directory_path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let directory = required_str(&args, "directory_path")?;
        ensure_safe(&self.permissions, directory)?;

        let path: PathBuf = expand_home(directory);
        if !path.is_dir() {
            return Err(ToolError::NotFound(format!("directory {directory}")));
        }

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        let mut file_types: BTreeMap<String, usize> = BTreeMap::new();

        let mut entries = fs::read_dir(&path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            if metadata.is_dir() {
                dirs.push(format!("📁 {name}/"));
            } else {
                let ext = entry
                    .path()
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                    .unwrap_or_default();
                files.push(format!("📄 {name} ({ext}, {} bytes)", metadata.len()));
                if !ext.is_empty() {
                    *file_types.entry(ext).or_default() += 1;
                }
            }
        }

        if files.is_empty() && dirs.is_empty() {
            return Ok(format!("📂 Directory {directory} is empty"));
        }

        dirs.sort();
        files.sort();
        let mut result = format!("📂 Contents of {directory}:\n");
        result.push_str(&dirs.into_iter().chain(files).collect::<Vec<_>>().join("\n"));

        if !file_types.is_empty() {
            let summary: Vec<String> = file_types
                .iter()
                .map(|(ext, count)| format!("{count} {ext}"))
                .collect();
            result.push_str("\n\n📊 File types found: ");
            result.push_str(&summary.join(", "));
        }
        Ok(result)
    }
}
