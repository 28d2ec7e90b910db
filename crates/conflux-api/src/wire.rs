//! The wire shape of a stream chunk.
//!
//! `conflux_flow::Chunk` is the engine's internal vocabulary and carries
//! none of `chunk_id`/`session_id`/`agent_name` — those are request-scoped,
//! not something a node or the engine can know. This module wraps every
//! outgoing `Chunk` into the flat, client-facing object clients expect,
//! the same way the `execution::sse_proxy` wraps an upstream SSE
//! event into `axum::response::sse::Event` before forwarding it.

use axum::response::sse::Event;
use conflux_flow::Chunk;
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct StreamChunk {
    pub chunk_id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub chunk_type: String,
    pub content: String,
    pub agent_name: String,
    pub metadata: Map<String, Value>,
    pub is_end: bool,
}

impl StreamChunk {
    /// Wraps an engine-produced chunk for one session/agent pair.
    pub fn from_chunk(chunk: &Chunk, session_id: &str, agent_name: &str) -> Self {
        let mut metadata = Map::new();
        let (chunk_type, content, is_end) = match chunk {
            Chunk::NodeStart { node_id, node_category, node_implementation, node_name, node_label } => {
                metadata.insert("node_id".into(), json!(node_id));
                metadata.insert("node_category".into(), json!(node_category));
                metadata.insert("node_implementation".into(), json!(node_implementation));
                metadata.insert("node_name".into(), json!(node_name));
                metadata.insert("node_label".into(), json!(node_label));
                ("node_start", String::new(), false)
            }
            Chunk::Content { content, metadata: extra } => {
                extend(&mut metadata, extra);
                ("content", content.clone(), false)
            }
            Chunk::ToolResult { tool_name, result, metadata: extra } => {
                metadata.insert("tool_name".into(), json!(tool_name));
                metadata.insert("tool_result".into(), result.clone());
                extend(&mut metadata, extra);
                ("tool_result", String::new(), false)
            }
            Chunk::ToolError { tool_name, error } => {
                metadata.insert("tool_name".into(), json!(tool_name));
                metadata.insert("error".into(), json!(error));
                ("tool_error", String::new(), false)
            }
            Chunk::NodeComplete { node_id, output, metadata: extra } => {
                metadata.insert("node_id".into(), json!(node_id));
                metadata.insert("output".into(), output.clone());
                extend(&mut metadata, extra);
                ("node_complete", String::new(), false)
            }
            Chunk::NodeError { node_id, error } => {
                metadata.insert("node_id".into(), json!(node_id));
                metadata.insert("error".into(), json!(error));
                ("node_error", String::new(), false)
            }
            Chunk::FlowNodesExtend { parent_node_id, nodes, edges, metadata: extra } => {
                metadata.insert("planner_node_id".into(), json!(parent_node_id));
                metadata.insert("nodes".into(), json!(nodes));
                metadata.insert("edges".into(), json!(edges));
                extend(&mut metadata, extra);
                ("flow_nodes_extend", String::new(), false)
            }
            Chunk::Final { content, is_end } => {
                let text = match content {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                ("final", text, *is_end)
            }
            Chunk::Done { tools_used } => {
                metadata.insert("tools_used".into(), json!(tools_used));
                ("done", String::new(), true)
            }
        };

        Self {
            chunk_id: conflux_types::create_id(),
            session_id: session_id.to_string(),
            chunk_type: chunk_type.to_string(),
            content,
            agent_name: agent_name.to_string(),
            metadata,
            is_end,
        }
    }

    /// Synthesizes the top-level `error` chunk a client expects when an
    /// exception happens outside a flow (e.g. the LLM call itself fails
    /// before `process_message_stream` ever returns a receiver).
    pub fn error(session_id: &str, agent_name: &str, message: impl Into<String>) -> Self {
        Self {
            chunk_id: conflux_types::create_id(),
            session_id: session_id.to_string(),
            chunk_type: "error".to_string(),
            content: message.into(),
            agent_name: agent_name.to_string(),
            metadata: Map::new(),
            is_end: false,
        }
    }

    /// The `done` chunk that must always follow an `error` chunk.
    pub fn done(session_id: &str, agent_name: &str, tools_used: &[String]) -> Self {
        Self::from_chunk(&Chunk::Done { tools_used: tools_used.to_vec() }, session_id, agent_name)
    }

    pub fn to_sse_event(&self) -> Event {
        Event::default().json_data(self).unwrap_or_else(|_| Event::default().data("{}"))
    }
}

fn extend(into: &mut Map<String, Value>, from: &std::collections::HashMap<String, Value>) {
    for (k, v) in from {
        into.insert(k.clone(), v.clone());
    }
}
