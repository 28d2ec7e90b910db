//! Streaming chunk vocabulary emitted by the engine and by nodes. Grounded on the `InterComEvent` (a tagged
//! `{event_type, payload}` envelope streamed over an unbounded mpsc channel,
//! `packages/executor/src/streaming.rs`) — flattened here to a closed enum
//! since conflux's chunk vocabulary is fixed, unlike the
//! open-ended intercom event types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    NodeStart {
        node_id: String,
        node_category: String,
        node_implementation: String,
        node_name: String,
        node_label: String,
    },
    Content {
        content: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        metadata: HashMap<String, serde_json::Value>,
    },
    ToolResult {
        tool_name: String,
        result: serde_json::Value,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        metadata: HashMap<String, serde_json::Value>,
    },
    ToolError {
        tool_name: String,
        error: String,
    },
    NodeComplete {
        node_id: String,
        output: serde_json::Value,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        metadata: HashMap<String, serde_json::Value>,
    },
    NodeError {
        node_id: String,
        error: String,
    },
    FlowNodesExtend {
        parent_node_id: String,
        nodes: Vec<conflux_types::model::NodeCfg>,
        edges: Vec<conflux_types::model::EdgeCfg>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        metadata: HashMap<String, serde_json::Value>,
    },
    Final {
        content: serde_json::Value,
        is_end: bool,
    },
    Done {
        tools_used: Vec<String>,
    },
}

impl Chunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Chunk::Final { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Chunk::NodeError { .. } | Chunk::ToolError { .. })
    }

    /// Accumulates a node's textual output from `content`/`tool_result`
    /// chunks during the walk.
    pub fn accumulate_text(&self, buffer: &mut String) {
        match self {
            Chunk::Content { content, .. } => buffer.push_str(content),
            Chunk::ToolResult { result, .. } => buffer.push_str(&stringify(result)),
            _ => {}
        }
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
