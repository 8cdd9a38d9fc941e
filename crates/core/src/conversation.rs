use deskpilot_providers::{Message, Role};
use std::collections::HashMap;

pub const DEFAULT_HISTORY_LIMIT: usize = 40;

/// In-memory conversation history per thread. System directives are never
/// stored; they are chosen per model call.
pub struct ConversationStore {
    threads: HashMap<String, Vec<Message>>,
    limit: usize,
}

impl ConversationStore {
    pub fn new(limit: usize) -> Self {
        Self {
            threads: HashMap::new(),
            limit: limit.max(1),
        }
    }

    pub fn history(&self, thread_id: &str) -> &[Message] {
        self.threads
            .get(thread_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Replace the stored history, keeping only the most recent messages.
    pub fn save(&mut self, thread_id: &str, mut messages: Vec<Message>) {
        messages.retain(|m| m.role != Role::System);
        trim_history(&mut messages, self.limit);
        self.threads.insert(thread_id.to_string(), messages);
    }

    pub fn clear(&mut self, thread_id: &str) {
        self.threads.remove(thread_id);
    }

    pub fn len(&self, thread_id: &str) -> usize {
        self.history(thread_id).len()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

/// Drop the oldest messages down to `limit`, then advance to a user turn so
/// the history never opens with an orphaned tool result. A single task longer
/// than `limit` keeps its own request, so the window may exceed `limit`.
fn trim_history(messages: &mut Vec<Message>, limit: usize) {
    if messages.len() <= limit {
        return;
    }
    let cut = messages.len() - limit;
    let start = messages[cut..]
        .iter()
        .position(|m| m.role == Role::User)
        .map(|offset| cut + offset)
        .or_else(|| messages[..cut].iter().rposition(|m| m.role == Role::User))
        .unwrap_or_else(|| {
            cut + messages[cut..]
                .iter()
                .take_while(|m| m.role == Role::Tool)
                .count()
        });
    messages.drain(..start);
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_providers::ToolCall;

    fn turn(i: usize) -> Vec<Message> {
        vec![
            Message::user(format!("request {i}")),
            Message::assistant("", Vec::new()),
            Message::tool("call_0", "done"),
            Message::assistant(format!("answer {i}"), Vec::new()),
        ]
    }

    #[test]
    fn test_unknown_thread_is_empty() {
        let store = ConversationStore::default();
        assert!(store.history("main").is_empty());
    }

    #[test]
    fn test_save_drops_system_messages() {
        let mut store = ConversationStore::default();
        let mut messages = vec![Message::system("directive")];
        messages.extend(turn(0));
        store.save("main", messages);
        assert_eq!(store.len("main"), 4);
        assert_eq!(store.history("main")[0].role, Role::User);
    }

    #[test]
    fn test_trim_starts_on_user_turn() {
        let mut store = ConversationStore::new(6);
        let messages: Vec<Message> = (0..3).flat_map(turn).collect();
        store.save("main", messages);

        let history = store.history("main");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "request 2");
    }

    #[test]
    fn test_long_single_task_keeps_its_request() {
        let mut store = ConversationStore::default();
        let mut messages = vec![Message::user("tidy the downloads folder")];
        for i in 0..25 {
            let call = ToolCall {
                id: format!("call_{i}"),
                name: "list_dir".to_string(),
                arguments: serde_json::json!({ "path": "~/Downloads" }),
            };
            messages.push(Message::assistant("", vec![call]));
            messages.push(Message::tool(format!("call_{i}"), "ok"));
        }
        messages.push(Message::assistant("done", Vec::new()));
        assert_eq!(messages.len(), 52);

        store.save("main", messages);

        let history = store.history("main");
        assert_eq!(history.len(), 52);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "tidy the downloads folder");
        assert_eq!(history[51].content, "done");
    }

    #[test]
    fn test_long_task_after_earlier_turns_drops_them() {
        let mut store = ConversationStore::new(6);
        let mut messages = turn(0);
        messages.push(Message::user("request 1"));
        for i in 0..4 {
            messages.push(Message::assistant("", Vec::new()));
            messages.push(Message::tool(format!("call_{i}"), "ok"));
        }
        store.save("main", messages);

        let history = store.history("main");
        assert_eq!(history.len(), 9);
        assert_eq!(history[0].content, "request 1");
    }

    #[test]
    fn test_history_without_user_turn_skips_orphaned_results() {
        let mut store = ConversationStore::new(3);
        let messages = vec![
            Message::assistant("", Vec::new()),
            Message::tool("call_0", "ok"),
            Message::tool("call_1", "ok"),
            Message::assistant("a", Vec::new()),
            Message::assistant("b", Vec::new()),
        ];
        store.save("main", messages);

        let history = store.history("main");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "a");
    }

    #[test]
    fn test_threads_are_separate() {
        let mut store = ConversationStore::default();
        store.save("a", turn(1));
        assert_eq!(store.len("a"), 4);
        assert_eq!(store.len("b"), 0);
        store.clear("a");
        assert_eq!(store.len("a"), 0);
    }
}
