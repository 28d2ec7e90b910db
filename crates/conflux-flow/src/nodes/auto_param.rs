//! AutoParamNode, grounded on
//! the original implementation:
//! asks the LLM to fill a target tool's parameters from the schema, the
//! user message, and the previous node's output, with a deterministic
//! fallback when the model's JSON can't be parsed.

use crate::nodes::common::{config_str, required_fields, resolve_tool_name};
use crate::register_flow_node;
use crate::registry::{NodeContext, NodeLogic};
use async_trait::async_trait;
use conflux_model::llm::CompletionRequest;
use conflux_model::{HistoryMessage, extract_json};
use conflux_types::Result;
use conflux_types::model::NodeCfg;
use serde_json::Value;

#[derive(Default)]
pub struct AutoParamNode;

#[async_trait]
impl NodeLogic for AutoParamNode {
    fn category(&self) -> &'static str {
        "auto_param"
    }

    fn implementation(&self) -> &'static str {
        "auto_param"
    }

    async fn execute_stream(&self, node: &NodeCfg, ctx: &mut NodeContext<'_>) -> Result<Value> {
        let config = node.data.config.clone();
        let target_node_id = config_str(&config, "target_tool_node_id");
        let key = config_str(&config, "auto_param_key")
            .map(str::to_string)
            .unwrap_or_else(|| format!("auto_params_{}", target_node_id.unwrap_or(&node.id)));

        let schema = resolve_tool_name(&config, ctx.tools)
            .and_then(|name| ctx.tools.get(&name))
            .map(|tool| tool.parameters_schema());

        let params = match &schema {
            Some(schema) => self.ask_llm(schema, ctx).await.unwrap_or_else(|| self.fallback(Some(schema), ctx.message)),
            None => self.fallback(None, ctx.message),
        };

        ctx.flow_state.set(key, params.clone());
        ctx.flow_state.save_output(&node.id, params.clone(), None);
        Ok(params)
    }
}

impl AutoParamNode {
    async fn ask_llm(&self, schema: &Value, ctx: &NodeContext<'_>) -> Option<Value> {
        let schema_json = serde_json::to_string_pretty(schema).ok()?;
        let previous_output = stringify(&ctx.flow_state.last_output);
        let system = "You fill in tool call parameters as a single JSON object matching the given schema. \
                      Respond with JSON only, no prose.";
        let user = format!(
            "schema_json:\n{schema_json}\n\nmessage:\n{}\n\nprevious_output:\n{previous_output}",
            ctx.message
        );
        let request = CompletionRequest::new(vec![HistoryMessage::system(system), HistoryMessage::user(user)]);
        let response = ctx.llm.complete(request).await.ok()?;
        match extract_json(&response) {
            Some(Value::Object(map)) => Some(Value::Object(map)),
            _ => None,
        }
    }

    /// AutoParamNode fallback: required fields filled with `message`; with
    /// no schema at all, `{query: message}`.
    fn fallback(&self, schema: Option<&Value>, message: &str) -> Value {
        match schema {
            Some(schema) => {
                let required = required_fields(schema);
                if required.is_empty() {
                    serde_json::json!({ "query": message })
                } else {
                    let mut map = serde_json::Map::new();
                    for field in required {
                        map.insert(field, Value::String(message.to_string()));
                    }
                    Value::Object(map)
                }
            }
            None => serde_json::json!({ "query": message }),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

register_flow_node!("auto_param", "auto_param", AutoParamNode);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FlowState;
    use conflux_model::mock::MockLlmProvider;
    use conflux_tools::builtins::WebSearchTool;
    use conflux_tools::{InMemoryScoreStore, ToolRegistry};
    use conflux_types::model::ToolType;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn node_cfg(config: Value) -> NodeCfg {
        NodeCfg {
            id: "auto1".to_string(),
            category: Some("auto_param".into()),
            implementation: Some("auto_param".into()),
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
    async fn writes_llm_parsed_params_to_flow_state() {
        let tools = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        tools.register(Arc::new(WebSearchTool), ToolType::Builtin);
        let llm = MockLlmProvider::with_response(r#"{"query": "Sun Tzu"}"#);
        let mut flow_state = FlowState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let context = conflux_store::Context::new();
        let mut ctx = NodeContext {
            user_id: "u1",
            message: "tell me about Sun Tzu",
            agent_name: "a1",
            context: &context,
            flow_state: &mut flow_state,
            tools: &tools,
            llm: &llm,
            sender: tx,
        };
        AutoParamNode
            .execute_stream(
                &node_cfg(serde_json::json!({"tool_name": "web_search", "target_tool_node_id": "toolNodeId"})),
                &mut ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            flow_state.get("auto_params_toolNodeId"),
            Some(&serde_json::json!({"query": "Sun Tzu"}))
        );
    }

    #[tokio::test]
    async fn no_schema_falls_back_to_query_message() {
        let tools = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        let llm = MockLlmProvider::new();
        let mut flow_state = FlowState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let context = conflux_store::Context::new();
        let mut ctx = NodeContext {
            user_id: "u1",
            message: "hello world",
            agent_name: "a1",
            context: &context,
            flow_state: &mut flow_state,
            tools: &tools,
            llm: &llm,
            sender: tx,
        };
        let out = AutoParamNode
            .execute_stream(&node_cfg(serde_json::json!({"target_tool_node_id": "x"})), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"query": "hello world"}));
    }
}
