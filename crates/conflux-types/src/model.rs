//! Core domain entities (spec §3) shared by every crate in the workspace:
//! session/message persistence shapes, agent/flow configuration, the tool
//! descriptor, and the knowledge-base document/chunk/triple types.
//!
//! These are plain serializable structs; the crates that own their
//! lifecycle (`conflux-store`, `conflux-flow`, `conflux-kb`, `conflux-graph`)
//! define the operations over them.

use crate::ids::{
    AgentName, ChunkId, DocumentId, KnowledgeBaseId, MessageId, NodeId, SessionId, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub agent_id: Option<AgentName>,
    pub is_active: bool,
    pub created_at: i64,
}

impl Session {
    pub fn new(user_id: UserId, agent_id: Option<AgentName>) -> Self {
        Self {
            session_id: SessionId::generate(),
            user_id,
            agent_id,
            is_active: true,
            created_at: crate::now_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    Assistant,
    System,
    Tool,
}

/// A single immutable chat message. The user message is written before
/// agent invocation; the assistant message is written on the final chunk
/// (spec §3 "Lifecycle & ownership").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub session_id: SessionId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    pub agent_name: Option<AgentName>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: i64,
}

impl Message {
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_id: MessageId::generate(),
            session_id,
            user_id,
            message_type,
            content: content.into(),
            agent_name: None,
            metadata: HashMap::new(),
            created_at: crate::now_millis(),
        }
    }
}

/// One flow node's contribution to an assistant message, ordered by
/// creation time. Written incrementally during streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageNode {
    pub message_id: MessageId,
    pub node_id: NodeId,
    pub node_type: String,
    pub node_name: String,
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    General,
    FlowDriven,
    Chat,
}

/// A bound tool reference: either a bare `server_tool` string or a richer
/// object carrying per-binding overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundTool {
    Name(String),
    Detailed {
        server_tool: String,
        #[serde(default)]
        config: HashMap<String, serde_json::Value>,
    },
}

impl BoundTool {
    pub fn server_tool(&self) -> &str {
        match self {
            BoundTool::Name(n) => n,
            BoundTool::Detailed { server_tool, .. } => server_tool,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: AgentName,
    pub agent_type: AgentType,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub bound_tools: Vec<BoundTool>,
    #[serde(default)]
    pub bound_knowledge_bases: Vec<KnowledgeBaseId>,
    pub flow_config: Option<FlowConfig>,
    pub llm_config_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    pub nodes: Vec<NodeCfg>,
    #[serde(default)]
    pub edges: Vec<EdgeCfg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub is_start_node: Option<bool>,
    #[serde(default)]
    pub is_end_node: Option<bool>,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            label: None,
            node_type: None,
            config: serde_json::Value::Object(Default::default()),
            is_start_node: None,
            is_end_node: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCfg {
    pub id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub implementation: Option<String>,
    #[serde(default)]
    pub data: NodeData,
    #[serde(default)]
    pub position: Option<(f64, f64)>,
    /// Inline connections, used when `edges` is absent from the wire config.
    #[serde(default)]
    pub connections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeCfg {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub source_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    Builtin,
    Mcp,
    Temporary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    #[default]
    None,
    Browser,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
    pub tool_type: ToolType,
    #[serde(default)]
    pub container_type: ContainerType,
    #[serde(default)]
    pub container_config: serde_json::Value,
    pub score: f32,
    pub is_available: bool,
}

pub const TOOL_DEFAULT_SCORE: f32 = 3.0;
pub const TOOL_MIN_AVAILABLE_SCORE: f32 = 1.5;
pub const TOOL_MIN_SCORE: f32 = 1.0;
pub const TOOL_MAX_SCORE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Chunked,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbDocument {
    pub id: DocumentId,
    pub knowledge_base_id: KnowledgeBaseId,
    pub name: String,
    pub file_type: String,
    pub content: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub extraction_status: ExtractionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    #[default]
    NotStarted,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub knowledge_base_id: KnowledgeBaseId,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub chunk_metadata: HashMap<String, serde_json::Value>,
    pub chunk_strategy: String,
    #[serde(default)]
    pub strategy_variant: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub domain_confidence: Option<f32>,
    #[serde(default)]
    pub is_summary: bool,
    #[serde(default)]
    pub summary_parent_chunk_id: Option<ChunkId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triple {
    pub knowledge_base_id: KnowledgeBaseId,
    pub document_id: DocumentId,
    #[serde(default)]
    pub chunk_id: Option<ChunkId>,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f32,
    pub source_text: String,
}

impl Triple {
    /// Uniqueness key per spec §3: `(kb_id, subject, predicate, object)`.
    pub fn dedup_key(&self) -> (String, String, String, String) {
        (
            self.knowledge_base_id.as_str().to_string(),
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
        )
    }
}
