//! Shared state across agent invocations: the per-`(agent, user)`
//! conversation window and pipeline, grounded on `base_agent.py`'s
//! `self.contexts: Dict[str, AgentContext]` (resident for the life of the
//! agent process) and its `get_pipeline`/`pipeline_*` helpers.

use async_trait::async_trait;
use conflux_model::llm::LlmProvider;
use conflux_model::history::{History, HistoryMessage};
use conflux_store::Pipeline;
use conflux_tools::ToolRegistry;
use conflux_types::Result;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

/// Queries a knowledge base by id, returning a block of retrieved context
/// text. Defined here (rather than depending on `conflux-kb` directly) so
/// this crate has no forward dependency on the retrieval layer; `conflux-api`
/// wires a real implementation in when it assembles agents at startup.
#[async_trait]
pub trait KnowledgeQuerier: Send + Sync {
    async fn query(&self, kb_id: &str, query: &str) -> Result<String>;
}

/// Rebuilds a conversation window from durably persisted chat messages,
/// matching `base_agent.py:get_context`'s fallback to
/// `MessageService.get_session_messages` when the in-process
/// `self.contexts` entry is absent (e.g. on a cold process). Defined here
/// rather than depending on `conflux-api::SessionStore` directly, the same
/// way `KnowledgeQuerier` decouples this crate from `conflux-kb`;
/// `conflux-api` wires a real implementation in when it builds agents.
#[async_trait]
pub trait SessionHistorySource: Send + Sync {
    async fn list_session_messages(&self, session_id: &str) -> Result<Vec<conflux_types::model::Message>>;
}

/// The resident conversation window for one `(agent, user)` pair, matching
/// `base_agent.py`'s in-memory `AgentContext.messages`.
#[derive(Default)]
pub struct AgentContextState {
    pub history: History,
}

/// Default window size for `build_conversation_history` (`base_agent.py`'s
/// `get_history_window_size`).
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Holds what every agent needs to run: the shared tool registry, the LLM
/// backend, the resident per-`(agent, user)` conversation windows, and a
/// lazily-created [`Pipeline`] per `(agent, user)` pair.
pub struct AgentRuntime {
    pub tools: Arc<ToolRegistry>,
    pub llm: Arc<dyn LlmProvider>,
    contexts: DashMap<String, AgentContextState>,
    pipelines: DashMap<String, Mutex<Pipeline>>,
}

impl AgentRuntime {
    pub fn new(tools: Arc<ToolRegistry>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            tools,
            llm,
            contexts: DashMap::new(),
            pipelines: DashMap::new(),
        }
    }

    fn context_key(agent_name: &str, user_id: &str) -> String {
        format!("{agent_name}:{user_id}")
    }

    /// Last `limit` turns for this `(agent, user)` pair, oldest first —
    /// excludes the current turn's message, which callers append themselves.
    pub fn history_window(&self, agent_name: &str, user_id: &str, limit: usize) -> Vec<HistoryMessage> {
        self.contexts
            .get(&Self::context_key(agent_name, user_id))
            .map(|state| state.history.windowed(limit))
            .unwrap_or_default()
    }

    /// Appends the user's message and the agent's reply to the resident
    /// conversation window, creating it if this is the first turn.
    pub fn push_turn(&self, agent_name: &str, user_id: &str, user_message: &str, agent_response: &str) {
        let mut state = self
            .contexts
            .entry(Self::context_key(agent_name, user_id))
            .or_default();
        state.history.push(HistoryMessage::user(user_message));
        state.history.push(HistoryMessage::assistant(agent_response));
    }

    /// Drops the resident conversation window for `(agent, user)`, matching
    /// `base_agent.py`'s `cleanup_context`.
    pub fn cleanup_context(&self, agent_name: &str, user_id: &str) {
        self.contexts.remove(&Self::context_key(agent_name, user_id));
    }

    /// True if no resident conversation window exists yet for `(agent, user)`
    /// — the condition under which callers should rebuild it from persisted
    /// storage (`base_agent.py:get_context`'s cold-context branch).
    pub fn has_no_context(&self, agent_name: &str, user_id: &str) -> bool {
        match self.contexts.get(&Self::context_key(agent_name, user_id)) {
            Some(state) => state.history.is_empty(),
            None => true,
        }
    }

    /// Seeds the resident conversation window for `(agent, user)` from
    /// messages rebuilt out of durable storage. A no-op if a window has
    /// since been populated by a concurrent turn, so a slow rehydration
    /// never clobbers fresher in-process history.
    pub fn rehydrate_window(&self, agent_name: &str, user_id: &str, messages: Vec<HistoryMessage>) {
        let mut state = self.contexts.entry(Self::context_key(agent_name, user_id)).or_default();
        if state.history.is_empty() {
            for message in messages {
                state.history.push(message);
            }
        }
    }

    /// Runs `f` against the lazily-created `Pipeline` for `(agent, user)`,
    /// matching `base_agent.py`'s `get_pipeline` (one pipeline instance
    /// reused across turns, stashed on the agent context).
    pub fn with_pipeline<R>(&self, agent_name: &str, user_id: &str, f: impl FnOnce(&mut Pipeline) -> R) -> R {
        let key = Self::context_key(agent_name, user_id);
        let entry = self
            .pipelines
            .entry(key.clone())
            .or_insert_with(|| Mutex::new(Pipeline::new(key)));
        let mut pipeline = entry.lock().expect("pipeline mutex poisoned");
        f(&mut pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_model::mock::MockLlmProvider;
    use conflux_tools::InMemoryScoreStore;

    fn runtime() -> AgentRuntime {
        AgentRuntime::new(
            Arc::new(ToolRegistry::new(Arc::new(InMemoryScoreStore::new()))),
            Arc::new(MockLlmProvider::new()),
        )
    }

    #[test]
    fn push_turn_then_window_returns_both_messages() {
        let runtime = runtime();
        runtime.push_turn("a1", "u1", "hello", "hi there");
        let window = runtime.history_window("a1", "u1", 10);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "hello");
        assert_eq!(window[1].content, "hi there");
    }

    #[test]
    fn cleanup_context_clears_the_window() {
        let runtime = runtime();
        runtime.push_turn("a1", "u1", "hello", "hi there");
        runtime.cleanup_context("a1", "u1");
        assert!(runtime.history_window("a1", "u1", 10).is_empty());
    }

    #[test]
    fn has_no_context_is_true_until_populated() {
        let runtime = runtime();
        assert!(runtime.has_no_context("a1", "u1"));
        runtime.push_turn("a1", "u1", "hello", "hi there");
        assert!(!runtime.has_no_context("a1", "u1"));
    }

    #[test]
    fn rehydrate_window_seeds_an_empty_context() {
        let runtime = runtime();
        runtime.rehydrate_window(
            "a1",
            "u1",
            vec![HistoryMessage::user("my name is Alice"), HistoryMessage::assistant("nice to meet you")],
        );
        let window = runtime.history_window("a1", "u1", 10);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "my name is Alice");
    }

    #[test]
    fn rehydrate_window_does_not_clobber_an_already_populated_context() {
        let runtime = runtime();
        runtime.push_turn("a1", "u1", "hello", "hi there");
        runtime.rehydrate_window("a1", "u1", vec![HistoryMessage::user("stale")]);
        let window = runtime.history_window("a1", "u1", 10);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "hello");
    }

    #[test]
    fn with_pipeline_reuses_the_same_instance_across_calls() {
        let runtime = runtime();
        runtime.with_pipeline("a1", "u1", |p| {
            p.remember_user_message("hello", None);
        });
        let matches = runtime.with_pipeline("a1", "u1", |p| p.search_memory("hello", None, None, None, None, None));
        assert_eq!(matches.len(), 1);
    }
}
