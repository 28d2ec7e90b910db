//! CompositeNode, grounded on
//! the original implementation: wraps a
//! sub-flow, deriving a scoped sub-`flow_state` via `input_mapping`,
//! running it to completion, then mapping results back via
//! `output_mapping` (or `last_output`/`save_as`).
//!
//! The nested walk is driven in-process here rather than via a second
//! `Engine` (which owns `Arc`-level tool/llm handles `NodeContext` only
//! borrows) — same node-registry dispatch, just inlined.

use crate::chunk::Chunk;
use crate::graph::Graph;
use crate::nodes::common::config_str;
use crate::register_flow_node;
use crate::registry::{find_node, NodeContext, NodeLogic};
use crate::state::FlowState;
use async_trait::async_trait;
use conflux_types::Result;
use conflux_types::model::{FlowConfig, NodeCfg};
use serde_json::Value;

#[derive(Default)]
pub struct CompositeNode;

#[async_trait]
impl NodeLogic for CompositeNode {
    fn category(&self) -> &'static str {
        "composite"
    }

    fn implementation(&self) -> &'static str {
        "composite"
    }

    async fn execute_stream(&self, node: &NodeCfg, ctx: &mut NodeContext<'_>) -> Result<Value> {
        let config = node.data.config.clone();
        let subflow_value = config.get("subflow").cloned().unwrap_or(serde_json::json!({"nodes": [], "edges": []}));
        let subflow: FlowConfig = serde_json::from_value(subflow_value)
            .map_err(|e| conflux_types::Error::config(format!("composite node subflow: {e}")))?;

        let input_mapping = config.get("input_mapping").and_then(|v| v.as_object()).cloned().unwrap_or_default();
        let output_mapping = config.get("output_mapping").and_then(|v| v.as_object()).cloned().unwrap_or_default();
        let save_as = config_str(&config, "save_as").map(str::to_string);

        let graph = Graph::build_from_config(subflow, None);
        let mut sub_state = FlowState::new();
        if input_mapping.is_empty() {
            sub_state.set("last_output", ctx.flow_state.last_output.clone());
        } else {
            for (parent_key, child_key) in &input_mapping {
                let child_key = child_key.as_str().unwrap_or(parent_key.as_str());
                if let Some(value) = ctx.flow_state.get(parent_key) {
                    sub_state.set(child_key, value.clone());
                }
            }
        }

        let mut current = graph.start_node_id.clone();
        for _ in 0..crate::engine::MAX_STEPS {
            let Some(sub_node) = graph.node(&current).cloned() else { break };
            let Some(node_logic) = find_node(sub_node.category.as_deref(), sub_node.implementation.as_deref()) else {
                return Err(conflux_types::Error::config(format!(
                    "composite sub-flow: no node implementation for `{current}`"
                )));
            };

            let (sub_tx, mut sub_rx) = tokio::sync::mpsc::unbounded_channel();
            let mut sub_ctx = NodeContext {
                user_id: ctx.user_id,
                message: ctx.message,
                agent_name: ctx.agent_name,
                context: ctx.context,
                flow_state: &mut sub_state,
                tools: ctx.tools,
                llm: ctx.llm,
                sender: sub_tx,
            };
            let result = node_logic.execute_stream(&sub_node, &mut sub_ctx).await;
            while let Ok(chunk) = sub_rx.try_recv() {
                let annotated = annotate(chunk, &node.id);
                let _ = ctx.sender.send(annotated);
            }
            result?;

            if graph.is_end(&sub_node.id) {
                break;
            }
            let next = if graph.is_router(&sub_node.id) {
                let connections = graph.connections(&sub_node.id);
                let branch = sub_state.router_decision.as_ref().map(|d| d.selected_branch).unwrap_or(true);
                if branch { connections.first().cloned() } else { connections.get(1).cloned().or_else(|| connections.first().cloned()) }
            } else {
                graph.connections(&sub_node.id).first().cloned()
            };
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        let sub_final = sub_state.last_output.clone();
        if output_mapping.is_empty() {
            ctx.flow_state.save_output(&node.id, sub_final.clone(), save_as.as_deref());
        } else {
            for (child_key, parent_key) in &output_mapping {
                let parent_key = parent_key.as_str().unwrap_or(child_key.as_str());
                if let Some(value) = sub_state.get(child_key) {
                    ctx.flow_state.set(parent_key, value.clone());
                }
            }
            ctx.flow_state.save_output(&node.id, sub_final.clone(), save_as.as_deref());
        }
        Ok(sub_final)
    }
}

fn annotate(chunk: Chunk, composite_node_id: &str) -> Chunk {
    match chunk {
        Chunk::Content { content, mut metadata } => {
            metadata.insert("composite_node_id".to_string(), Value::String(composite_node_id.to_string()));
            Chunk::Content { content, metadata }
        }
        Chunk::ToolResult { tool_name, result, mut metadata } => {
            metadata.insert("composite_node_id".to_string(), Value::String(composite_node_id.to_string()));
            Chunk::ToolResult { tool_name, result, metadata }
        }
        other => other,
    }
}

register_flow_node!("composite", "composite", CompositeNode);

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_model::mock::MockLlmProvider;
    use conflux_tools::{InMemoryScoreStore, ToolRegistry};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn node_cfg(config: Value) -> NodeCfg {
        NodeCfg {
            id: "comp1".to_string(),
            category: Some("composite".into()),
            implementation: Some("composite".into()),
            data: conflux_types::model::NodeData {
                label: None,
                node_type: None,
                config,
                is_start_node: None,
                is_end_node: None,
            },
            position: None,
            connections: vec![],
        }
    }

    #[tokio::test]
    async fn runs_subflow_and_writes_save_as() {
        crate::ensure_nodes_linked();
        let tools = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        let llm = MockLlmProvider::with_response("sub result");
        let mut flow_state = FlowState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let context = conflux_store::Context::new();
        let subflow = serde_json::json!({
            "nodes": [
                {"id": "s", "category": "start", "implementation": "start", "connections": ["l"]},
                {"id": "l", "category": "llm", "implementation": "llm", "connections": ["e"], "data": {"config": {}}},
                {"id": "e", "category": "end", "implementation": "end", "connections": []}
            ],
            "edges": []
        });
        let mut ctx = NodeContext {
            user_id: "u1",
            message: "hi",
            agent_name: "a1",
            context: &context,
            flow_state: &mut flow_state,
            tools: &tools,
            llm: &llm,
            sender: tx,
        };
        let out = CompositeNode
            .execute_stream(&node_cfg(serde_json::json!({"subflow": subflow, "save_as": "composite_answer"})), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, Value::String("sub result".into()));
        assert_eq!(flow_state.get("composite_answer"), Some(&Value::String("sub result".into())));
        let mut saw_annotated = false;
        while let Ok(chunk) = rx.try_recv() {
            if let Chunk::Content { metadata, .. } = chunk {
                if metadata.contains_key("composite_node_id") {
                    saw_annotated = true;
                }
            }
        }
        assert!(saw_annotated);
    }
}
