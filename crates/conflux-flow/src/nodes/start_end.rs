//! StartNode and EndNode, grounded on
//! the original implementation,end_node}.py`.
//! The engine itself (not the node) owns emitting the run's single `final`
//! chunk once it reaches an end node (see `engine.rs`'s `graph.is_end`
//! branch) to preserve  "exactly one final chunk" invariant, so
//! these nodes only produce their output value.

use crate::nodes::common::config_str;
use crate::register_flow_node;
use crate::registry::{NodeContext, NodeLogic};
use async_trait::async_trait;
use conflux_types::Result;
use conflux_types::model::NodeCfg;
use serde_json::Value;

#[derive(Default)]
pub struct StartNode;

#[async_trait]
impl NodeLogic for StartNode {
    fn category(&self) -> &'static str {
        "start"
    }

    fn implementation(&self) -> &'static str {
        "start"
    }

    async fn execute_stream(&self, node: &NodeCfg, ctx: &mut NodeContext<'_>) -> Result<Value> {
        let output = Value::String(ctx.message.to_string());
        let save_as = config_str(&node.data.config, "save_as");
        ctx.flow_state.save_output(&node.id, output.clone(), save_as);
        Ok(output)
    }
}

register_flow_node!("start", "start", StartNode);

#[derive(Default)]
pub struct EndNode;

#[async_trait]
impl NodeLogic for EndNode {
    fn category(&self) -> &'static str {
        "end"
    }

    fn implementation(&self) -> &'static str {
        "end"
    }

    async fn execute_stream(&self, _node: &NodeCfg, ctx: &mut NodeContext<'_>) -> Result<Value> {
        Ok(ctx.flow_state.last_output.clone())
    }
}

register_flow_node!("end", "end", EndNode);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FlowState;
    use conflux_model::mock::MockLlmProvider;
    use conflux_tools::{InMemoryScoreStore, ToolRegistry};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn node_cfg(id: &str) -> NodeCfg {
        NodeCfg {
            id: id.to_string(),
            category: None,
            implementation: None,
            data: Default::default(),
            position: None,
            connections: vec![],
        }
    }

    #[tokio::test]
    async fn start_persists_message_as_output() {
        let tools = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        let llm = MockLlmProvider::new();
        let mut flow_state = FlowState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let context = conflux_store::Context::new();
        let mut ctx = NodeContext {
            user_id: "u1",
            message: "hello",
            agent_name: "a1",
            context: &context,
            flow_state: &mut flow_state,
            tools: &tools,
            llm: &llm,
            sender: tx,
        };
        let out = StartNode.execute_stream(&node_cfg("start"), &mut ctx).await.unwrap();
        assert_eq!(out, Value::String("hello".into()));
        assert_eq!(flow_state.last_output, Value::String("hello".into()));
    }
}
