//! Interactive session loop.

use crate::bootstrap::Session;
use deskpilot_core::{AgentError, Assistant, RequestOutcome, StepObserver, SwitcherState};
use deskpilot_providers::{LoadedModel, ModelLoader, ProviderId, ProviderRegistry};
use deskpilot_tools::Observation;
use serde_json::Value;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Exit,
    Help,
    Stats,
    ShowModel,
    SwitchTo(ProviderId),
    UnknownProvider(String),
    Task(String),
}

const HELP_WORDS: &[&str] = &["help", "commands", "?", "help me"];
const SHOW_MODEL_PHRASES: &[&str] = &["show model", "current model", "which model"];

pub fn parse_command(line: &str) -> Command {
    let input = line.trim();
    let lowered = input.to_lowercase();

    if input.is_empty() {
        return Command::Empty;
    }
    if lowered == "exit" || lowered == "quit" {
        return Command::Exit;
    }
    if HELP_WORDS.contains(&lowered.as_str()) {
        return Command::Help;
    }
    if lowered == "stats" {
        return Command::Stats;
    }
    if SHOW_MODEL_PHRASES.iter().any(|p| lowered.contains(p)) {
        return Command::ShowModel;
    }

    if let Some(rest) = lowered.strip_prefix("switch to ") {
        return match rest.trim().parse() {
            Ok(provider) => Command::SwitchTo(provider),
            Err(_) => Command::UnknownProvider(rest.trim().to_string()),
        };
    }
    // "use <provider>" only when the rest is exactly a provider name, so
    // "use firefox to open gmail" stays a task.
    if let Some(rest) = lowered.strip_prefix("use ") {
        if let Ok(provider) = rest.trim().parse() {
            return Command::SwitchTo(provider);
        }
    }

    Command::Task(input.to_string())
}

pub fn help_text() -> String {
    [
        "📋 AVAILABLE COMMANDS",
        "",
        "🔄 Model switching:",
        "   • switch to local   - Use the local Ollama model",
        "   • switch to groq    - Use Groq (fast)",
        "   • switch to gemini  - Use Gemini (reliable)",
        "   • show model        - Show the current model",
        "",
        "💡 General:",
        "   • stats             - Show usage and savings",
        "   • help              - Show this help message",
        "   • exit              - Quit",
        "",
        "🤖 Example tasks:",
        "   • Organize my Desktop by file type",
        "   • List files in my Downloads",
        "   • Open Firefox",
    ]
    .join("\n")
}

pub fn model_info(
    registry: &ProviderRegistry,
    state: SwitcherState,
    current: Option<&LoadedModel>,
) -> String {
    let Some(model) = current else {
        return "⚠️  No model loaded yet".to_string();
    };
    let descriptor = registry.descriptor(model.provider);
    let mut out = format!(
        "📊 Current Model:\n   Provider: {} {}\n   Name: {}\n   Model: {}\n   Tier: {}\n   Cost: {}",
        descriptor.icon,
        model.provider.as_str().to_uppercase(),
        descriptor.display_name,
        model.model,
        model.tier,
        descriptor.cost_note,
    );
    if model.provider.is_local() {
        out.push_str("\n   ⚠️ Limited capability for complex tasks");
    }
    if state == SwitcherState::Exhausted {
        out.push_str("\n   🏠 Fallback mode: every cloud provider failed this session");
    }
    out
}

fn args_preview(args: &Value) -> String {
    let text = args.to_string();
    if text.chars().count() > 160 {
        let cut: String = text.chars().take(160).collect();
        format!("{cut}…")
    } else {
        text
    }
}

/// Prints agent progress to stdout.
pub struct ConsoleObserver;

impl StepObserver for ConsoleObserver {
    fn on_thinking(&mut self, text: &str) {
        println!("💭 AI Thinking: {text}");
    }

    fn on_tool_call(&mut self, name: &str, args: &Value) {
        println!("🔧 Calling Tool: {name}({})", args_preview(args));
    }

    fn on_tool_result(&mut self, _name: &str, observation: &Observation) {
        println!("✅ Tool Result:\n{}\n", observation.text);
    }

    fn on_rate_limited(&mut self, attempt: usize, max_retries: usize, error: &str) {
        println!("\n⚠️  Rate limit hit ({attempt}/{max_retries}): {error}");
        println!("🔄 Switching provider and resuming the task...");
    }

    fn on_provider_switch(&mut self, model: &LoadedModel) {
        println!("✅ Switched to {} ({}). Retrying task...\n", model.provider, model.model);
    }
}

fn print_events<L: ModelLoader>(assistant: &mut Assistant<L>) {
    for event in assistant.switcher_mut().drain_events() {
        println!("{event}");
    }
}

fn banner() {
    println!("══════════════════════════════════════════════════════════════════");
    println!("🤖 DeskPilot - desktop assistant");
    println!("══════════════════════════════════════════════════════════════════");
    println!("   Providers fall back Groq → Gemini → Local, even mid-task.");
    println!("   Type 'help' for commands, 'exit' to quit.");
    println!();
}

pub async fn run(session: Session) -> io::Result<()> {
    let Session {
        mut assistant,
        registry,
    } = session;

    banner();
    println!("🔄 Loading model...");
    assistant.start().await;
    print_events(&mut assistant);
    println!();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("🤖 Your command: ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Exit => break,
            Command::Help => println!("\n{}\n", help_text()),
            Command::Stats => println!("\n{}\n", assistant.stats().snapshot().summary()),
            Command::ShowModel => {
                let switcher = assistant.switcher();
                println!(
                    "\n{}\n",
                    model_info(&registry, switcher.state(), switcher.current())
                );
            }
            Command::UnknownProvider(name) => {
                println!("❓ Unknown provider '{name}'. Try local, groq or gemini.");
            }
            Command::SwitchTo(provider) => {
                println!("\n🔄 Switching to {provider}...");
                let result = assistant
                    .switch_to(provider)
                    .await
                    .map(|model| format!("{} ({})", model.provider, model.model));
                print_events(&mut assistant);
                match result {
                    Ok(active) => println!("✅ Now using {active}\n"),
                    Err(e) => println!("❌ Could not switch: {e}\n"),
                }
            }
            Command::Task(request) => {
                println!("🧠 AI is processing your request...\n");
                let result = assistant.handle(&request, &mut ConsoleObserver).await;
                print_events(&mut assistant);
                match result {
                    Ok(RequestOutcome::Blocked { .. }) => {
                        println!("🚫 Unsafe command blocked! Try something nice.");
                    }
                    Ok(RequestOutcome::Cached(answer)) => {
                        println!("💾 (cached)\n{answer}\n");
                    }
                    Ok(RequestOutcome::Completed(outcome)) => {
                        println!("\n{}\n", outcome.answer);
                    }
                    Err(AgentError::RetriesExhausted { last_error, .. }) => {
                        println!("\n❌ Max retries reached. Error: {last_error}");
                        println!("💡 All AI providers are rate limited. Wait or try again later.\n");
                    }
                    Err(e) => println!("\n❌ Error: {e}\n"),
                }
            }
        }
    }

    println!("\n{}", assistant.stats().snapshot().summary());
    println!("👋 Goodbye!");
    Ok(())
}
