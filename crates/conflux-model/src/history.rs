//! Conversation history shape, following the pattern of
//! `packages/model-provider/src/history.rs` `HistoryMessage`/`Role` (there
//! layered over `rig`'s multi-modal content types; here flattened to plain
//! text since the runtime's only multi-modal concern is tool-call
//! round-tripping, not image/audio attachments).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A bounded conversation window, as built by `build_conversation_history`:
/// last N messages plus the current user message.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<HistoryMessage>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: HistoryMessage) {
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[HistoryMessage] {
        &self.messages
    }

    /// Last `limit` messages (default 10 per ), oldest first.
    pub fn windowed(&self, limit: usize) -> Vec<HistoryMessage> {
        let start = self.messages.len().saturating_sub(limit);
        self.messages[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windowed_keeps_only_the_tail() {
        let mut history = History::new();
        for i in 0..15 {
            history.push(HistoryMessage::user(format!("msg {i}")));
        }
        let windowed = history.windowed(10);
        assert_eq!(windowed.len(), 10);
        assert_eq!(windowed[0].content, "msg 5");
        assert_eq!(windowed[9].content, "msg 14");
    }
}
