use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf",
    "sudo rm",
    "format",
    "delete system",
    "shutdown -h",
    "mkfs",
    "dd if=",
    ":(){:",
    "fork bomb",
    "> /dev/sda",
    "mv /* ",
    "chmod -r 777 /",
    "killall",
    "pkill",
    "halt",
    "reboot",
    "init 0",
    "init 6",
    "poweroff",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionResult {
    Allowed,
    /// Carries the pattern that matched.
    Denied(String),
}

impl PermissionResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionResult::Allowed)
    }
}

/// Case-insensitive substring denylist applied to requests and command
/// arguments before anything runs.
pub struct PermissionEngine {
    blocked_patterns: Vec<String>,
}

impl PermissionEngine {
    pub fn new() -> Self {
        Self {
            blocked_patterns: DANGEROUS_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn check(&self, action: &str) -> PermissionResult {
        let lowered = action.to_lowercase();
        for pattern in &self.blocked_patterns {
            if lowered.contains(pattern.as_str()) {
                warn!(pattern = %pattern, "blocked dangerous action");
                return PermissionResult::Denied(pattern.clone());
            }
        }
        PermissionResult::Allowed
    }

    pub fn add_blocked_pattern(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into().to_lowercase();
        if !pattern.is_empty() && !self.blocked_patterns.contains(&pattern) {
            self.blocked_patterns.push(pattern);
        }
    }
}

impl Default for PermissionEngine {
    fn default() -> Self {
        Self::new()
    }
}
