//! Shell-out helpers shared by the desktop and process tools.

use crate::traits::ToolError;
use deskpilot_policy::{PermissionEngine, PermissionResult};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

pub(crate) fn ensure_safe(permissions: &PermissionEngine, action: &str) -> Result<(), ToolError> {
    match permissions.check(action) {
        PermissionResult::Allowed => Ok(()),
        PermissionResult::Denied(pattern) => Err(ToolError::Blocked(format!(
            "'{action}' contains dangerous pattern '{pattern}'"
        ))),
    }
}

pub(crate) async fn command_exists(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub(crate) async fn run_checked(command: &str, args: &[&str]) -> Result<(), ToolError> {
    run_output(command, args).await.map(|_| ())
}

pub(crate) async fn run_output(command: &str, args: &[&str]) -> Result<String, ToolError> {
    let output = Command::new(command).args(args).output().await?;
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).to_string());
    }
    Err(ToolError::Execution(format!(
        "{command} failed: {}",
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

/// Output of a `sh -c` run that finished inside its timeout.
pub(crate) struct ShellOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    /// stdout if there is any, otherwise stderr.
    pub fn text(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

pub(crate) async fn run_shell(command: &str, timeout: Duration) -> Result<ShellOutput, ToolError> {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| ToolError::Timeout(timeout.as_secs()))??;

    Ok(ShellOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Expand a leading `~`.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir();
    }
    match trimmed.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(trimmed),
    }
}
