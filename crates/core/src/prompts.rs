use deskpilot_providers::ProviderId;
use std::borrow::Cow;

/// Directive for cloud models.
pub const CLOUD_DIRECTIVE: &str = "\
You are a desktop assistant with tools that control this computer.
═══════════════════════════════════════════════
🎯 HOW TO WORK

1. Look before you act: inspect what actually exists (list_directory, check_running_apps).
2. Fit the plan to what you found. Only create folders for file types that are present.
3. Batch related operations and avoid needless steps.
4. Verify the result (verify_expectations) before reporting success.
═══════════════════════════════════════════════
⚡ TOOLS

- Files: list_directory, search_file, read_file_content, get_current_directory
- Shell: execute_terminal_command (30 s timeout, dangerous commands are blocked)
- Desktop: open_app, open_url, move_mouse, click_mouse, type_text, press_key, take_screenshot, get_screen_info
- Reasoning: plan_task, self_critique, debug_last_error
- Memory: save_to_memory, recall_from_memory, clear_memory
═══════════════════════════════════════════════
✅ When a step fails, call debug_last_error and try the best ranked strategy.
✅ Save lessons worth keeping with save_to_memory.

Answer briefly once the task is done and say what changed.";

/// Shorter directive for the local model, which gets a reduced tool set.
pub const LOCAL_DIRECTIVE: &str = "\
You are a desktop assistant. Look before you act, do only what is needed and check your work.

When organizing files:
1. list_directory to see what is there
2. create folders only for file types you found
3. move the files with execute_terminal_command
4. list the directory again to verify

Tools: list_directory, execute_terminal_command, read_file_content, get_current_directory, open_app, open_url";

const DECORATIVE_PREFIXES: &[&str] = &["=", "─", "━", "═", "🎯", "⚡", "✅"];

pub fn directive_for(provider: ProviderId) -> &'static str {
    if provider.is_local() {
        LOCAL_DIRECTIVE
    } else {
        CLOUD_DIRECTIVE
    }
}

/// Drop blank and decorative lines.
pub fn compress_prompt(prompt: &str) -> String {
    prompt
        .lines()
        .map(str::trim_end)
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !DECORATIVE_PREFIXES.iter().any(|p| trimmed.starts_with(p))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The directive to send for `provider`, compressed when `compress` is set.
pub fn system_directive(provider: ProviderId, compress: bool) -> Cow<'static, str> {
    let directive = directive_for(provider);
    if compress {
        Cow::Owned(compress_prompt(directive))
    } else {
        Cow::Borrowed(directive)
    }
}
