//! FlowDrivenAgent: delegates `process_message_stream` to
//! the Flow Engine (C4/C5), injecting its own name and persisting
//! per-node output into `MessageNode` records via the engine's
//! `on_chunk`/`on_final` hooks. Grounded on
//! the original implementation.

use async_trait::async_trait;
use conflux_flow::{Chunk, Engine, EngineHooks};
use conflux_store::Context as PipelineContext;
use conflux_types::ids::{AgentName, KnowledgeBaseId, MessageId, NodeId};
use conflux_types::model::{BoundTool, FlowConfig, MessageNode};
use conflux_types::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::runtime::AgentRuntime;

/// Where `AgentHooks` delivers `MessageNode` records as a flow streams,
/// one per completed node.
#[async_trait]
pub trait MessageNodeSink: Send + Sync {
    async fn record(&self, node: MessageNode);
}

struct PendingNodeMeta {
    node_type: String,
    node_name: String,
}

/// `EngineHooks` impl shared by every `FlowDrivenAgent` run: tags each
/// `node_complete` with the `node_start` metadata seen earlier in the same
/// run and hands it to the sink.
pub struct AgentHooks {
    agent_name: AgentName,
    message_id: MessageId,
    sink: Option<Arc<dyn MessageNodeSink>>,
    pending: Mutex<HashMap<String, PendingNodeMeta>>,
}

impl AgentHooks {
    pub fn new(agent_name: AgentName, message_id: MessageId, sink: Option<Arc<dyn MessageNodeSink>>) -> Self {
        Self {
            agent_name,
            message_id,
            sink,
            pending: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl EngineHooks for AgentHooks {
    fn on_chunk(&self, chunk: Chunk) -> Option<Chunk> {
        match &chunk {
            Chunk::NodeStart { node_id, node_implementation, node_name, .. } => {
                self.pending.lock().expect("hooks mutex poisoned").insert(
                    node_id.clone(),
                    PendingNodeMeta {
                        node_type: node_implementation.clone(),
                        node_name: node_name.clone(),
                    },
                );
            }
            Chunk::NodeComplete { node_id, output, metadata } => {
                let meta = self.pending.lock().expect("hooks mutex poisoned").remove(node_id);
                if let (Some(sink), Some(meta)) = (self.sink.clone(), meta) {
                    tracing::debug!(agent = %self.agent_name, node_id, "recording message node");
                    let node = MessageNode {
                        message_id: self.message_id.clone(),
                        node_id: NodeId::new(node_id.clone()),
                        node_type: meta.node_type,
                        node_name: meta.node_name,
                        content: stringify(output),
                        metadata: metadata.clone(),
                        created_at: conflux_types::now_millis(),
                    };
                    tokio::spawn(async move { sink.record(node).await });
                }
            }
            _ => {}
        }
        Some(chunk)
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct FlowDrivenAgent {
    pub name: AgentName,
    pub flow_config: FlowConfig,
    pub bound_tools: Vec<BoundTool>,
    pub bound_knowledge_bases: Vec<KnowledgeBaseId>,
    pub runtime: Arc<AgentRuntime>,
    pub message_node_sink: Option<Arc<dyn MessageNodeSink>>,
}

impl FlowDrivenAgent {
    pub fn new(name: AgentName, flow_config: FlowConfig, runtime: Arc<AgentRuntime>) -> Self {
        Self {
            name,
            flow_config,
            bound_tools: Vec::new(),
            bound_knowledge_bases: Vec::new(),
            runtime,
            message_node_sink: None,
        }
    }

    pub fn with_message_node_sink(mut self, sink: Arc<dyn MessageNodeSink>) -> Self {
        self.message_node_sink = Some(sink);
        self
    }

    pub async fn process_message_stream(
        &self,
        user_id: &str,
        message: &str,
        context: &PipelineContext,
        message_id: MessageId,
        session_id: Option<&str>,
    ) -> Result<UnboundedReceiver<Chunk>> {
        let hooks = Arc::new(AgentHooks::new(self.name.clone(), message_id, self.message_node_sink.clone()));
        let engine = Engine::build_from_config(
            self.flow_config.clone(),
            None,
            self.runtime.tools.clone(),
            self.runtime.llm.clone(),
        )
        .with_hooks(hooks);
        let mut context = context.clone();
        context.insert("agent_name".to_string(), serde_json::Value::String(self.name.to_string()));
        engine.run_stream(user_id, message, &context, None, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_model::mock::MockLlmProvider;
    use conflux_tools::InMemoryScoreStore;
    use conflux_tools::ToolRegistry;
    use conflux_types::model::{EdgeCfg, NodeCfg, NodeData};
    use std::sync::Mutex as StdMutex;

    struct CollectingSink {
        nodes: Arc<StdMutex<Vec<MessageNode>>>,
    }

    #[async_trait]
    impl MessageNodeSink for CollectingSink {
        async fn record(&self, node: MessageNode) {
            self.nodes.lock().unwrap().push(node);
        }
    }

    fn single_llm_node_flow() -> FlowConfig {
        FlowConfig {
            nodes: vec![NodeCfg {
                id: "llm1".into(),
                category: Some("llm".into()),
                implementation: Some("llm".into()),
                data: NodeData {
                    label: Some("LLM".into()),
                    node_type: Some("llm".into()),
                    config: serde_json::json!({ "system_prompt": "be terse", "user_prompt": "{{message}}" }),
                    is_start_node: None,
                    is_end_node: None,
                },
                position: None,
                connections: vec![],
            }],
            edges: vec![EdgeCfg { source: "llm1".into(), target: "llm1".into(), source_handle: None, source_index: None }],
        }
    }

    #[tokio::test]
    async fn records_message_nodes_for_each_completed_node() {
        let registry = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        let runtime = Arc::new(AgentRuntime::new(Arc::new(registry), Arc::new(MockLlmProvider::with_response("ok"))));
        let nodes = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::new(CollectingSink { nodes: nodes.clone() });
        let agent = FlowDrivenAgent::new(AgentName::new("flow1"), single_llm_node_flow(), runtime)
            .with_message_node_sink(sink);
        conflux_flow::ensure_nodes_linked();

        let ctx = PipelineContext::new();
        let mut rx = agent
            .process_message_stream("u1", "hi", &ctx, MessageId::new("m1"), None)
            .await
            .unwrap();
        while rx.recv().await.is_some() {}

        // Give the detached recording tasks a chance to run.
        tokio::task::yield_now().await;
        assert!(!nodes.lock().unwrap().is_empty());
    }
}
