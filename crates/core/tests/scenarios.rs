mod common;

use common::{rate_limited, text, tool_call, LoadFailure, MockLoader, RecordingTool};
use deskpilot_core::{
    AgentConfig, AgentError, AgentLoop, ModelSwitcher, Silent, SwitchEvent, SwitcherState,
    TaskClassifier, UsageStats,
};
use deskpilot_providers::{Message, ProviderId, Role, Tier};
use deskpilot_tools::ToolRegistry;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn switcher(loader: MockLoader, order: Vec<ProviderId>) -> ModelSwitcher<MockLoader> {
    ModelSwitcher::new(
        loader,
        TaskClassifier::default(),
        order,
        Duration::from_secs(60),
    )
}

fn registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(RecordingTool::new("list_directory")));
    tools.register(Arc::new(RecordingTool::new("plan_task")));
    tools
}

#[test]
fn short_listing_request_uses_small_tier() {
    let classifier = TaskClassifier::default();
    assert_eq!(classifier.classify("list files in Downloads"), Tier::Small);
}

#[test]
fn debug_request_uses_large_tier() {
    let classifier = TaskClassifier::default();
    assert_eq!(classifier.classify("debug why the export failed"), Tier::Large);
}

#[tokio::test]
async fn rate_limited_first_provider_is_skipped() {
    let loader = MockLoader::new().limited(ProviderId::Groq, 0);
    let mut switcher = switcher(loader, ProviderId::ALL.to_vec());

    let model = switcher.acquire("open firefox").await;
    assert_eq!(model.provider, ProviderId::Gemini);
    assert_eq!(switcher.state(), SwitcherState::Active(ProviderId::Gemini));
    assert!(switcher.failed().is_empty());
    assert!(switcher
        .drain_events()
        .contains(&SwitchEvent::RateLimited(ProviderId::Groq)));
}

#[tokio::test]
async fn unavailable_remotes_land_on_local() {
    let loader = MockLoader::new()
        .failing(ProviderId::Groq, LoadFailure::MissingCredential)
        .failing(ProviderId::Gemini, LoadFailure::Unavailable);
    let mut switcher = switcher(loader, ProviderId::ALL.to_vec());

    let model = switcher.acquire("open firefox").await;
    assert_eq!(model.provider, ProviderId::Ollama);
    assert_eq!(switcher.state(), SwitcherState::Active(ProviderId::Ollama));
    assert!(switcher.failed().contains(&ProviderId::Groq));
    assert!(switcher.failed().contains(&ProviderId::Gemini));
}

#[tokio::test]
async fn unavailable_remotes_without_local_in_order_exhaust() {
    let loader = MockLoader::new()
        .failing(ProviderId::Groq, LoadFailure::MissingCredential)
        .failing(ProviderId::Gemini, LoadFailure::Unavailable);
    let mut switcher = switcher(loader, vec![ProviderId::Groq, ProviderId::Gemini]);

    let model = switcher.acquire("open firefox").await;
    assert_eq!(model.provider, ProviderId::Ollama);
    assert_eq!(switcher.state(), SwitcherState::Exhausted);
    assert_eq!(switcher.state().active_provider(), Some(ProviderId::Ollama));
}

#[tokio::test]
async fn mid_task_rate_limit_resumes_on_next_provider() {
    let loader = MockLoader::new()
        .script(
            ProviderId::Groq,
            vec![
                tool_call("call_1", "list_directory", json!({"directory_path": "~/Desktop"})),
                rate_limited(),
            ],
        )
        .script(ProviderId::Gemini, vec![text("Desktop has 3 files")]);
    let log = loader.log.clone();
    let mut switcher = switcher(loader, ProviderId::ALL.to_vec());

    let stats = UsageStats::new();
    let agent = AgentLoop::new(registry(), AgentConfig::default(), stats.clone());
    let mut history = Vec::new();
    let outcome = agent
        .run(&mut switcher, &mut history, "what is on my desktop", &mut Silent)
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Desktop has 3 files");
    assert_eq!(outcome.provider, ProviderId::Gemini);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.tool_calls, 1);
    assert_eq!(log.providers(), vec![ProviderId::Groq, ProviderId::Groq, ProviderId::Gemini]);

    // Gemini sees the tool exchange produced on groq.
    let resumed = &log.calls()[2].messages;
    assert_eq!(resumed[0].role, Role::System);
    assert_eq!(resumed[1], Message::user("what is on my desktop"));
    assert_eq!(resumed[2].tool_calls[0].name, "list_directory");
    assert_eq!(resumed[3].role, Role::Tool);
    assert_eq!(resumed[3].content, "list_directory ok");

    assert!(switcher.failed().contains(&ProviderId::Groq));
    assert_eq!(stats.snapshot().provider_switches, 1);
    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn retries_are_bounded() {
    let loader = MockLoader::new()
        .script(ProviderId::Groq, vec![rate_limited()])
        .script(ProviderId::Gemini, vec![rate_limited()])
        .script(ProviderId::Ollama, vec![rate_limited()]);
    let log = loader.log.clone();
    let mut switcher = switcher(loader, ProviderId::ALL.to_vec());

    let agent = AgentLoop::new(registry(), AgentConfig::default(), UsageStats::new());
    let mut history = Vec::new();
    let err = agent
        .run(&mut switcher, &mut history, "open firefox", &mut Silent)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(log.calls().len(), 3);
}

#[tokio::test]
async fn local_provider_gets_reduced_tools_and_directive() {
    let loader = MockLoader::new()
        .failing(ProviderId::Groq, LoadFailure::MissingCredential)
        .failing(ProviderId::Gemini, LoadFailure::MissingCredential);
    let log = loader.log.clone();
    let mut switcher = switcher(loader, ProviderId::ALL.to_vec());

    let agent = AgentLoop::new(registry(), AgentConfig::default(), UsageStats::new());
    let mut history = Vec::new();
    agent
        .run(&mut switcher, &mut history, "open firefox", &mut Silent)
        .await
        .unwrap();

    let call = &log.calls()[0];
    assert_eq!(call.provider, ProviderId::Ollama);
    assert_eq!(call.tool_names, vec!["list_directory".to_string()]);
    assert_eq!(call.messages[0].content, deskpilot_core::prompts::LOCAL_DIRECTIVE);
}

#[tokio::test]
async fn non_rate_errors_surface_immediately() {
    let loader = MockLoader::new().script(
        ProviderId::Groq,
        vec![Err(deskpilot_providers::ProviderError::Api {
            status: 401,
            body: "invalid api key".to_string(),
        })],
    );
    let log = loader.log.clone();
    let mut switcher = switcher(loader, ProviderId::ALL.to_vec());

    let agent = AgentLoop::new(registry(), AgentConfig::default(), UsageStats::new());
    let mut history = Vec::new();
    let err = agent
        .run(&mut switcher, &mut history, "open firefox", &mut Silent)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Provider(_)));
    assert_eq!(log.calls().len(), 1);
    assert!(switcher.failed().is_empty());
}

#[tokio::test]
async fn step_limit_stops_tool_loops() {
    let replies = (0..10)
        .map(|i| tool_call(&format!("call_{i}"), "plan_task", json!({})))
        .collect();
    let loader = MockLoader::new().script(ProviderId::Groq, replies);
    let mut switcher = switcher(loader, ProviderId::ALL.to_vec());

    let config = AgentConfig {
        recursion_limit: 3,
        ..AgentConfig::default()
    };
    let agent = AgentLoop::new(registry(), config, UsageStats::new());
    let mut history = Vec::new();
    let err = agent
        .run(&mut switcher, &mut history, "plan my week", &mut Silent)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::StepLimit(3)));
    // user + 3 × (assistant call + tool result)
    assert_eq!(history.len(), 7);
}

#[tokio::test]
async fn local_window_denial_triggers_switch() {
    // One slot: used by acquire, so the first model call is denied locally.
    let loader = MockLoader::new().limited(ProviderId::Groq, 1);
    let log = loader.log.clone();
    let mut switcher = switcher(loader, ProviderId::ALL.to_vec());

    let agent = AgentLoop::new(registry(), AgentConfig::default(), UsageStats::new());
    let mut history = Vec::new();
    let outcome = agent
        .run(&mut switcher, &mut history, "open firefox", &mut Silent)
        .await
        .unwrap();

    assert_eq!(outcome.provider, ProviderId::Gemini);
    assert_eq!(log.providers(), vec![ProviderId::Gemini]);
}
