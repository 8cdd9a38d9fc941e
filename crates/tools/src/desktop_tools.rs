//! Mouse, keyboard, app launching and screen capture for Wayland desktops.

use crate::backend::{command_exists, ensure_safe, home_dir, run_checked, run_output};
use crate::traits::{optional_i64, optional_str, required_str, Tool, ToolError};
use async_trait::async_trait;
use deskpilot_policy::PermissionEngine;
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::process::Command;
use tokio::time::{sleep, Duration};

fn validate_coordinate(value: i64, label: &str) -> Result<i32, ToolError> {
    if !(0..=i32::MAX as i64).contains(&value) {
        return Err(ToolError::Validation(format!(
            "{label} must be >= 0, got {value}"
        )));
    }
    Ok(value as i32)
}

fn validate_key_token(key: &str) -> Result<(), ToolError> {
    if key.trim().is_empty() {
        return Err(ToolError::Validation("key cannot be empty".to_string()));
    }
    if !key
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '+'))
    {
        return Err(ToolError::Validation(format!(
            "key '{key}' contains invalid characters"
        )));
    }
    Ok(())
}

fn validate_app_name(app: &str) -> Result<(), ToolError> {
    if app.trim().is_empty() {
        return Err(ToolError::Validation("app_name cannot be empty".to_string()));
    }
    if !app
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ' '))
    {
        return Err(ToolError::Validation(
            "app_name contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

fn normalize_url(url: &str) -> Result<String, ToolError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ToolError::Validation("url cannot be empty".to_string()));
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || lower.starts_with("file://")
    {
        return Ok(trimmed.to_string());
    }
    if trimmed.contains("://") {
        return Err(ToolError::Validation(format!(
            "unsupported url scheme in '{trimmed}'"
        )));
    }
    Ok(format!("https://{trimmed}"))
}

/// Map friendly key names to the keysyms wtype expects.
fn keysym(key: &str) -> String {
    match key.to_lowercase().as_str() {
        "enter" | "return" => "Return".to_string(),
        "tab" => "Tab".to_string(),
        "escape" | "esc" => "Escape".to_string(),
        "backspace" => "BackSpace".to_string(),
        "delete" | "del" => "Delete".to_string(),
        "space" => "space".to_string(),
        "up" => "Up".to_string(),
        "down" => "Down".to_string(),
        "left" => "Left".to_string(),
        "right" => "Right".to_string(),
        "home" => "Home".to_string(),
        "end" => "End".to_string(),
        "command" | "super" | "win" => "Super_L".to_string(),
        _ => key.to_string(),
    }
}

async fn move_pointer(x: i32, y: i32) -> Result<(), ToolError> {
    let xs = x.to_string();
    let ys = y.to_string();

    if command_exists("wlrctl").await {
        return run_checked("wlrctl", &["pointer", "move", &xs, &ys]).await;
    }
    if command_exists("ydotool").await {
        return run_checked("ydotool", &["mousemove", "--absolute", "-x", &xs, "-y", &ys]).await;
    }
    if command_exists("xdotool").await {
        return run_checked("xdotool", &["mousemove", &xs, &ys]).await;
    }
    Err(ToolError::Execution(
        "No mouse move backend found (install 'wlrctl', 'ydotool' or 'xdotool')".to_string(),
    ))
}

async fn click_button(button: &str) -> Result<(), ToolError> {
    let (ydotool_code, xdotool_code, repeat) = match button {
        "left" => ("0xC0", "1", 1),
        "right" => ("0xC1", "3", 1),
        "middle" => ("0xC2", "2", 1),
        "double" => ("0xC0", "1", 2),
        other => {
            return Err(ToolError::Validation(format!(
                "unsupported mouse button '{other}' (use left, right, middle or double)"
            )))
        }
    };

    if command_exists("ydotool").await {
        let repeat = repeat.to_string();
        return run_checked("ydotool", &["click", "--repeat", &repeat, ydotool_code]).await;
    }
    if command_exists("xdotool").await {
        let repeat = repeat.to_string();
        return run_checked("xdotool", &["click", "--repeat", &repeat, xdotool_code]).await;
    }
    Err(ToolError::Execution(
        "No click backend found (install 'ydotool' or 'xdotool')".to_string(),
    ))
}

pub struct MoveMouseTool {
    permissions: Arc<PermissionEngine>,
}

impl MoveMouseTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for MoveMouseTool {
    fn name(&self) -> &str {
        "move_mouse"
    }

    fn description(&self) -> &str {
        "Move the mouse pointer to absolute screen coordinates x,y, optionally with human-like movement"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "x": { "type": "integer", "description": "Horizontal pixel position" },
                "y": { "type": "integer", "description": "Vertical pixel position" },
                "human_like": { "type": "boolean", "description": "Add slight jitter and pauses", "default": true }
            },
            "required": ["x", "y"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let x = optional_i64(&args, "x")
            .ok_or_else(|| ToolError::Validation("Missing 'x' field".to_string()))?;
        let y = optional_i64(&args, "y")
            .ok_or_else(|| ToolError::Validation("Missing 'y' field".to_string()))?;
        let x = validate_coordinate(x, "x")?;
        let y = validate_coordinate(y, "y")?;
        ensure_safe(&self.permissions, &format!("move to {x},{y}"))?;

        if args["human_like"].as_bool().unwrap_or(true) {
            // Overshoot slightly, then settle on the exact target.
            let (jx, jy, pause) = {
                let mut rng = rand::thread_rng();
                (
                    rng.gen_range(-5..=5),
                    rng.gen_range(-5..=5),
                    rng.gen_range(20..60),
                )
            };
            move_pointer((x + jx).max(0), (y + jy).max(0)).await?;
            sleep(Duration::from_millis(pause)).await;
        }
        move_pointer(x, y).await?;
        Ok(format!("🖱️ Mouse moved to ({x}, {y})"))
    }
}

pub struct ClickMouseTool {
    permissions: Arc<PermissionEngine>,
}

impl ClickMouseTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for ClickMouseTool {
    fn name(&self) -> &str {
        "click_mouse"
    }

    fn description(&self) -> &str {
        "Click the mouse at its current position (left, right, middle or double)"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "button": {
                    "type": "string",
                    "enum": ["left", "right", "middle", "double"],
                    "default": "left"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let button = optional_str(&args, "button")
            .unwrap_or("left")
            .to_lowercase();
        ensure_safe(&self.permissions, "click")?;
        click_button(&button).await?;
        Ok(format!("🖱️ Clicked {button} button."))
    }
}

pub struct TypeTextTool {
    permissions: Arc<PermissionEngine>,
}

impl TypeTextTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for TypeTextTool {
    fn name(&self) -> &str {
        "type_text"
    }

    fn description(&self) -> &str {
        "Type text at the current cursor position in the focused window"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to type" },
                "interval": { "type": "number", "description": "Seconds between keystrokes", "default": 0.05 }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let text = required_str(&args, "text")?;
        if text.contains('\0') {
            return Err(ToolError::Validation("text contains null byte".to_string()));
        }
        ensure_safe(&self.permissions, text)?;

        let delay_ms = (args["interval"].as_f64().unwrap_or(0.05).clamp(0.0, 1.0) * 1000.0)
            .round()
            .to_string();

        if command_exists("wtype").await {
            run_checked("wtype", &["-d", &delay_ms, text]).await?;
        } else if command_exists("ydotool").await {
            run_checked("ydotool", &["type", "--key-delay", &delay_ms, text]).await?;
        } else if command_exists("xdotool").await {
            run_checked("xdotool", &["type", "--delay", &delay_ms, text]).await?;
        } else {
            return Err(ToolError::Execution(
                "No text input backend found (install 'wtype', 'ydotool' or 'xdotool')".to_string(),
            ));
        }

        let preview: String = text.chars().take(50).collect();
        let ellipsis = if text.chars().count() > 50 { "..." } else { "" };
        Ok(format!("⌨️ Typed: '{preview}{ellipsis}'"))
    }
}

pub struct PressKeyTool {
    permissions: Arc<PermissionEngine>,
}

impl PressKeyTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for PressKeyTool {
    fn name(&self) -> &str {
        "press_key"
    }

    fn description(&self) -> &str {
        "Press a keyboard key one or more times, e.g. enter, tab, escape, backspace, space"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string" },
                "times": { "type": "integer", "default": 1, "minimum": 1, "maximum": 50 }
            },
            "required": ["key"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let key = required_str(&args, "key")?.trim();
        validate_key_token(key)?;
        ensure_safe(&self.permissions, key)?;
        let times = optional_i64(&args, "times").unwrap_or(1).clamp(1, 50);
        let sym = keysym(key);

        for _ in 0..times {
            if command_exists("wtype").await {
                run_checked("wtype", &["-k", &sym]).await?;
            } else if command_exists("xdotool").await {
                run_checked("xdotool", &["key", &sym]).await?;
            } else {
                return Err(ToolError::Execution(
                    "No key backend found (install 'wtype' or 'xdotool')".to_string(),
                ));
            }
            sleep(Duration::from_millis(100)).await;
        }
        Ok(format!("⌨️ Pressed '{key}' {times} time(s)"))
    }
}

pub struct OpenAppTool {
    permissions: Arc<PermissionEngine>,
}

impl OpenAppTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for OpenAppTool {
    fn name(&self) -> &str {
        "open_app"
    }

    fn description(&self) -> &str {
        "Launch a desktop application by its command name, e.g. firefox, code, nautilus"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "app_name": { "type": "string" }
            },
            "required": ["app_name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let app = required_str(&args, "app_name")?.trim();
        validate_app_name(app)?;
        ensure_safe(&self.permissions, app)?;

        let mut parts = app.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ToolError::Validation("app_name cannot be empty".to_string()))?;

        if !command_exists(program).await {
            if command_exists("gtk-launch").await {
                run_checked("gtk-launch", &[program]).await?;
                return Ok(format!("🚀 {app} opened."));
            }
            return Err(ToolError::NotFound(format!(
                "application '{program}' is not installed"
            )));
        }

        Command::new(program).args(parts).spawn()?;
        Ok(format!("🚀 {app} opened."))
    }
}

pub struct OpenUrlTool {
    permissions: Arc<PermissionEngine>,
}

impl OpenUrlTool {
    pub fn new(permissions: Arc<PermissionEngine>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for OpenUrlTool {
    fn name(&self) -> &str {
        "open_url"
    }

    fn description(&self) -> &str {
        "Open a website URL in the default browser"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let url = normalize_url(required_str(&args, "url")?)?;
        ensure_safe(&self.permissions, &url)?;
        Command::new("xdg-open").arg(&url).spawn()?;
        Ok(format!("🌐 Opened {url} in browser."))
    }
}

pub struct TakeScreenshotTool;

#[async_trait]
impl Tool for TakeScreenshotTool {
    fn name(&self) -> &str {
        "take_screenshot"
    }

    fn description(&self) -> &str {
        "Save a screenshot to ~/Desktop for checking what is on screen. Returns the saved path"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": { "type": "string", "default": "debug_screenshot.png" }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let filename = optional_str(&args, "filename").unwrap_or("debug_screenshot.png");
        if filename.contains('/') {
            return Err(ToolError::Validation(
                "filename must not contain path separators".to_string(),
            ));
        }

        let desktop = home_dir().join("Desktop");
        let dir = if desktop.is_dir() { desktop } else { std::env::temp_dir() };
        let target = dir.join(filename);
        let target_str = target.to_string_lossy().to_string();

        if command_exists("grim").await {
            run_checked("grim", &[&target_str]).await?;
        } else if command_exists("hyprshot").await {
            run_checked("hyprshot", &["-m", "output", "-o", &target_str]).await?;
        } else if command_exists("import").await {
            run_checked("import", &["-window", "root", &target_str]).await?;
        } else {
            return Err(ToolError::Execution(
                "No screenshot backend found (install 'grim' or 'hyprshot')".to_string(),
            ));
        }
        Ok(format!("📸 Screenshot saved to: {target_str}"))
    }
}

pub struct GetScreenInfoTool;

/// Sum of monitor widths and the tallest monitor, from `hyprctl monitors -j`.
fn screen_size(monitors: &Value) -> Option<(i64, i64)> {
    let monitors = monitors.as_array()?;
    if monitors.is_empty() {
        return None;
    }
    let width = monitors.iter().filter_map(|m| m["width"].as_i64()).sum();
    let height = monitors
        .iter()
        .filter_map(|m| m["height"].as_i64())
        .max()?;
    Some((width, height))
}

#[async_trait]
impl Tool for GetScreenInfoTool {
    fn name(&self) -> &str {
        "get_screen_info"
    }

    fn description(&self) -> &str {
        "Get screen dimensions and the current mouse position, useful before moving the mouse"
    }

    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> Result<String, ToolError> {
        if !command_exists("hyprctl").await {
            return Err(ToolError::Execution(
                "hyprctl not found; screen info requires Hyprland".to_string(),
            ));
        }

        let raw = run_output("hyprctl", &["monitors", "-j"]).await?;
        let monitors: Value = serde_json::from_str(&raw)
            .map_err(|e| ToolError::Execution(format!("bad monitor data: {e}")))?;
        let (width, height) = screen_size(&monitors)
            .ok_or_else(|| ToolError::NotFound("no monitors reported".to_string()))?;

        let cursor = run_output("hyprctl", &["cursorpos"]).await?;
        Ok(format!(
            "🖥️ Screen: {width}x{height} | Mouse position: ({})",
            cursor.trim()
        ))
    }
}
