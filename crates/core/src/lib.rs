pub mod agent_loop;
pub mod assistant;
pub mod classifier;
pub mod conversation;
pub mod metrics;
pub mod prompts;
pub mod switcher;

pub use agent_loop::{AgentConfig, AgentError, AgentLoop, Silent, StepObserver, TaskOutcome};
pub use assistant::{Assistant, RequestOutcome};
pub use classifier::TaskClassifier;
pub use conversation::ConversationStore;
pub use metrics::{estimate_tokens, UsageSnapshot, UsageStats};
pub use switcher::{ModelSwitcher, SwitchError, SwitchEvent, SwitcherState, LOCAL_FALLBACK};
