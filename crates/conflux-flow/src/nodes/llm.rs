//! LLMNode, grounded on
//! the original implementation: renders
//! `system_prompt`/`user_prompt` against `flow_state + {message}`, streams
//! the completion as `content` chunks, then best-effort JSON-parses the
//! full response and merges any object keys into `flow_state`.

use crate::chunk::Chunk;
use crate::nodes::common::config_str;
use crate::register_flow_node;
use crate::registry::{NodeContext, NodeLogic};
use async_trait::async_trait;
use conflux_model::llm::{CompletionRequest, LlmChunk};
use conflux_model::{HistoryMessage, extract_json};
use conflux_types::Result;
use conflux_types::model::NodeCfg;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct LlmNode;

#[async_trait]
impl NodeLogic for LlmNode {
    fn category(&self) -> &'static str {
        "llm"
    }

    fn implementation(&self) -> &'static str {
        "llm"
    }

    async fn execute_stream(&self, node: &NodeCfg, ctx: &mut NodeContext<'_>) -> Result<Value> {
        let config = &node.data.config;
        let system_prompt = config_str(config, "system_prompt").unwrap_or_default();
        let user_prompt = config_str(config, "user_prompt").unwrap_or(ctx.message);
        let save_as = config_str(config, "save_as").map(str::to_string);

        let rendered_system = ctx.flow_state.render_template(system_prompt, ctx.message);
        let rendered_user = ctx.flow_state.render_template(user_prompt, ctx.message);

        let mut messages = Vec::new();
        if !rendered_system.trim().is_empty() {
            messages.push(HistoryMessage::system(rendered_system));
        }
        messages.push(HistoryMessage::user(rendered_user));

        let accumulated = Arc::new(Mutex::new(String::new()));
        let sender = ctx.sender.clone();
        let accumulated_for_cb = accumulated.clone();
        let callback: conflux_model::llm::LlmStreamCallback = Arc::new(move |chunk: LlmChunk| {
            let sender = sender.clone();
            let accumulated = accumulated_for_cb.clone();
            Box::pin(async move {
                if !chunk.delta.is_empty() {
                    accumulated.lock().await.push_str(&chunk.delta);
                    let _ = sender.send(Chunk::Content {
                        content: chunk.delta,
                        metadata: Default::default(),
                    });
                }
                Ok(())
            })
        });

        let request = CompletionRequest::new(messages);
        let full_text = ctx.llm.complete_stream(request, callback).await?;
        let full_text = if full_text.is_empty() {
            accumulated.lock().await.clone()
        } else {
            full_text
        };

        if let Some(Value::Object(parsed)) = extract_json(&full_text) {
            for (key, value) in parsed {
                ctx.flow_state.set(key, value);
            }
        }

        let output = Value::String(full_text);
        ctx.flow_state.save_output(&node.id, output.clone(), save_as.as_deref());
        Ok(output)
    }
}

register_flow_node!("llm", "llm", LlmNode);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FlowState;
    use conflux_model::mock::MockLlmProvider;
    use conflux_tools::{InMemoryScoreStore, ToolRegistry};
    use std::sync::Arc as StdArc;
    use tokio::sync::mpsc;

    fn node_cfg(config: Value) -> NodeCfg {
        NodeCfg {
            id: "llm1".to_string(),
            category: Some("llm".into()),
            implementation: Some("llm".into()),
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
    async fn streams_content_and_accumulates_full_text() {
        let tools = ToolRegistry::new(StdArc::new(InMemoryScoreStore::new()));
        let llm = MockLlmProvider::with_response("hello there");
        let mut flow_state = FlowState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let context = conflux_store::Context::new();
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
        let out = LlmNode
            .execute_stream(&node_cfg(serde_json::json!({"user_prompt": "{{message}}"})), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, Value::String("hello there".into()));
        let mut collected = String::new();
        while let Ok(chunk) = rx.try_recv() {
            chunk.accumulate_text(&mut collected);
        }
        assert_eq!(collected, "hello there");
    }

    #[tokio::test]
    async fn merges_parsed_json_object_into_flow_state() {
        let tools = ToolRegistry::new(StdArc::new(InMemoryScoreStore::new()));
        let llm = MockLlmProvider::with_response(r#"{"score": 4}"#);
        let mut flow_state = FlowState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let context = conflux_store::Context::new();
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
        LlmNode.execute_stream(&node_cfg(serde_json::json!({})), &mut ctx).await.unwrap();
        assert_eq!(flow_state.get("score"), Some(&serde_json::json!(4)));
    }
}
