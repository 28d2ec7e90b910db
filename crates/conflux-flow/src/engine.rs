//! The C4 Flow Engine: sequential graph walk over a [`Graph`], streaming
//! [`Chunk`]s as it goes. A comparable pull-based dataflow engine would walk
//! nodes in parallel; this walk is intentionally the Python original's
//! *sequential single-active-node* walk, following the pattern of an
//! `InternalRun`/mpsc-channel streaming idiom
//! (`packages/executor/src/streaming.rs`) for how chunks are produced and
//! forwarded.

use crate::chunk::Chunk;
use crate::graph::Graph;
use crate::registry::{find_node, NodeContext};
use crate::state::FlowState;
use conflux_model::llm::LlmProvider;
use conflux_store::Context as PipelineContext;
use conflux_types::ids::{SessionId, UserId};
use conflux_types::model::{FlowConfig, Message, MessageType};
use conflux_types::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub const MAX_STEPS: usize = 1000;

/// `mount_provider`/`on_chunk`/`on_final`. Default
/// no-ops; callers (e.g. `conflux-agents`, `conflux-api`) override as needed.
#[async_trait::async_trait]
pub trait EngineHooks: Send + Sync {
    async fn mount_provider(&self, _mount_spec: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    fn on_chunk(&self, chunk: Chunk) -> Option<Chunk> {
        Some(chunk)
    }

    async fn on_final(&self, _chunk: &Chunk) {}
}

pub struct NoopHooks;

#[async_trait::async_trait]
impl EngineHooks for NoopHooks {}

pub struct Engine {
    graph: Graph,
    tools: Arc<conflux_tools::ToolRegistry>,
    llm: Arc<dyn LlmProvider>,
    hooks: Arc<dyn EngineHooks>,
}

impl Engine {
    pub fn build_from_config(
        config: FlowConfig,
        start: Option<&str>,
        tools: Arc<conflux_tools::ToolRegistry>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            graph: Graph::build_from_config(config, start),
            tools,
            llm,
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn EngineHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Buffers the full run and returns the accumulated messages as a
    /// non-streaming result.
    pub async fn run(&self, user_id: &str, message: &str, context: &PipelineContext, start: Option<&str>) -> Result<Vec<Message>> {
        let mut stream = self.run_stream(user_id, message, context, start, None).await?;
        let mut messages = Vec::new();
        let mut buffer = String::new();
        while let Some(chunk) = stream.recv().await {
            chunk.accumulate_text(&mut buffer);
            if let Chunk::Final { content, .. } = &chunk {
                let text = match content {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let session_id = context
                    .get("session_id")
                    .and_then(|v| v.as_str())
                    .map(SessionId::new)
                    .unwrap_or_else(SessionId::generate);
                let mut assistant_message = Message::new(
                    session_id,
                    UserId::new(user_id),
                    MessageType::Assistant,
                    if text.is_empty() { buffer.clone() } else { text },
                );
                assistant_message.agent_name = Some(conflux_types::ids::AgentName::new(
                    context.get("agent_name").and_then(|v| v.as_str()).unwrap_or("agent"),
                ));
                messages.push(assistant_message);
            }
        }
        Ok(messages)
    }

    /// Spawns the walk as a background task and returns the chunk receiver
    /// for streaming consumption.
    pub async fn run_stream(
        &self,
        user_id: &str,
        message: &str,
        context: &PipelineContext,
        start: Option<&str>,
        _session_id: Option<&str>,
    ) -> Result<UnboundedReceiver<Chunk>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let graph = Arc::new(self.graph.clone());
        let tools = self.tools.clone();
        let llm = self.llm.clone();
        let hooks = self.hooks.clone();
        let user_id = user_id.to_string();
        let message = message.to_string();
        let context = context.clone();
        let start = start.map(str::to_string);

        tokio::spawn(async move {
            Self::walk(graph, tools, llm, hooks, user_id, message, context, start, tx).await;
        });

        Ok(rx)
    }

    #[allow(clippy::too_many_arguments)]
    async fn walk(
        graph: Arc<Graph>,
        tools: Arc<conflux_tools::ToolRegistry>,
        llm: Arc<dyn LlmProvider>,
        hooks: Arc<dyn EngineHooks>,
        user_id: String,
        message: String,
        context: PipelineContext,
        start: Option<String>,
        tx: UnboundedSender<Chunk>,
    ) {
        let mut flow_state = FlowState::new();
        let mut current = start.unwrap_or_else(|| graph.start_node_id.clone());
        let mut steps = 0usize;
        let mut tools_used: Vec<String> = Vec::new();
        let agent_name = context
            .get("agent_name")
            .and_then(|v| v.as_str())
            .unwrap_or("agent")
            .to_string();

        loop {
            steps += 1;
            if steps > MAX_STEPS {
                Self::emit(&hooks, &tx, Chunk::NodeError { node_id: current.clone(), error: "step cap exceeded".into() });
                break;
            }

            let Some(node_cfg) = graph.node(&current).cloned() else {
                Self::emit(&hooks, &tx, Chunk::NodeError { node_id: current.clone(), error: format!("unknown node {current}") });
                break;
            };

            Self::emit(
                &hooks,
                &tx,
                Chunk::NodeStart {
                    node_id: node_cfg.id.clone(),
                    node_category: node_cfg.category.clone().unwrap_or_default(),
                    node_implementation: node_cfg.implementation.clone().unwrap_or_default(),
                    node_name: node_cfg.data.node_type.clone().unwrap_or_default(),
                    node_label: node_cfg.data.label.clone().unwrap_or_default(),
                },
            );

            let Some(node_logic) = find_node(node_cfg.category.as_deref(), node_cfg.implementation.as_deref()) else {
                Self::emit(&hooks, &tx, Chunk::NodeError { node_id: node_cfg.id.clone(), error: "no node implementation registered".into() });
                break;
            };

            if node_logic.requires_mount() {
                if let Err(e) = hooks.mount_provider(&node_cfg.data.config).await {
                    Self::emit(&hooks, &tx, Chunk::NodeError { node_id: node_cfg.id.clone(), error: e.to_string() });
                    break;
                }
            }

            let (node_tx, mut node_rx) = mpsc::unbounded_channel();
            let mut ctx = NodeContext {
                user_id: &user_id,
                message: &message,
                agent_name: &agent_name,
                context: &context,
                flow_state: &mut flow_state,
                tools: &tools,
                llm: llm.as_ref(),
                sender: node_tx,
            };

            let execute = node_logic.execute_stream(&node_cfg, &mut ctx);
            tokio::pin!(execute);

            let mut output_buffer = String::new();
            let mut node_failed = false;
            let result = loop {
                tokio::select! {
                    biased;
                    chunk = node_rx.recv() => {
                        match chunk {
                            Some(chunk) => {
                                chunk.accumulate_text(&mut output_buffer);
                                node_failed = node_failed || chunk.is_error();
                                if let Chunk::ToolResult { tool_name, .. } = &chunk {
                                    tools_used.push(tool_name.clone());
                                }
                                Self::emit(&hooks, &tx, chunk);
                            }
                            None => {}
                        }
                    }
                    outcome = &mut execute => {
                        while let Ok(chunk) = node_rx.try_recv() {
                            chunk.accumulate_text(&mut output_buffer);
                            node_failed = node_failed || chunk.is_error();
                            if let Chunk::ToolResult { tool_name, .. } = &chunk {
                                tools_used.push(tool_name.clone());
                            }
                            Self::emit(&hooks, &tx, chunk);
                        }
                        break outcome;
                    }
                }
            };

            let output = match result {
                Ok(output) => output,
                Err(e) => {
                    Self::emit(&hooks, &tx, Chunk::NodeError { node_id: node_cfg.id.clone(), error: e.to_string() });
                    break;
                }
            };
            if node_failed {
                Self::emit(&hooks, &tx, Chunk::NodeComplete { node_id: node_cfg.id.clone(), output: output.clone(), metadata: Default::default() });
                break;
            }

            let complete_output = if output.is_null() && !output_buffer.is_empty() {
                serde_json::Value::String(output_buffer)
            } else {
                output
            };
            Self::emit(
                &hooks,
                &tx,
                Chunk::NodeComplete { node_id: node_cfg.id.clone(), output: complete_output, metadata: Default::default() },
            );

            if graph.is_end(&node_cfg.id) {
                let final_chunk = Chunk::Final { content: flow_state.last_output.clone(), is_end: true };
                hooks.on_final(&final_chunk).await;
                Self::emit(&hooks, &tx, final_chunk);
                Self::emit(&hooks, &tx, Chunk::Done { tools_used });
                return;
            }

            let next = if graph.is_router(&node_cfg.id) {
                let connections = graph.connections(&node_cfg.id);
                let branch = flow_state.router_decision.as_ref().map(|d| d.selected_branch).unwrap_or(true);
                if branch {
                    connections.first().cloned()
                } else {
                    connections.get(1).cloned().or_else(|| connections.first().cloned())
                }
            } else {
                graph.connections(&node_cfg.id).first().cloned()
            };

            match next {
                Some(next) => current = next,
                None => {
                    let final_chunk = Chunk::Final { content: flow_state.last_output.clone(), is_end: true };
                    hooks.on_final(&final_chunk).await;
                    Self::emit(&hooks, &tx, final_chunk);
                    Self::emit(&hooks, &tx, Chunk::Done { tools_used });
                    return;
                }
            }
        }

        let final_chunk = Chunk::Final { content: flow_state.last_output.clone(), is_end: true };
        hooks.on_final(&final_chunk).await;
        Self::emit(&hooks, &tx, final_chunk);
        Self::emit(&hooks, &tx, Chunk::Done { tools_used });
    }

    fn emit(hooks: &Arc<dyn EngineHooks>, tx: &UnboundedSender<Chunk>, chunk: Chunk) {
        if let Some(chunk) = hooks.on_chunk(chunk) {
            let _ = tx.send(chunk);
        }
    }
}

fn _assert_error_displays(e: &Error) -> String {
    e.to_string()
}
