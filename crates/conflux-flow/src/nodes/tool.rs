//! ToolNode, grounded on
//! the original implementation: resolves
//! a tool name, lets an upstream AutoParamNode override params, fills
//! missing required parameters from documented fallbacks, executes through
//! the registry, and (for search-like tools) records a synthetic
//! `search_results/...` file path for downstream report tools.

use crate::chunk::Chunk;
use crate::nodes::common::{config_obj, config_str, looks_like_schema_object, looks_like_search_tool, required_fields, resolve_tool_name, slugify};
use crate::register_flow_node;
use crate::registry::{NodeContext, NodeLogic};
use async_trait::async_trait;
use conflux_types::Result;
use conflux_types::model::NodeCfg;
use serde_json::Value;

#[derive(Default)]
pub struct ToolNode;

#[async_trait]
impl NodeLogic for ToolNode {
    fn category(&self) -> &'static str {
        "tool"
    }

    fn implementation(&self) -> &'static str {
        "tool"
    }

    async fn execute_stream(&self, node: &NodeCfg, ctx: &mut NodeContext<'_>) -> Result<Value> {
        let config = node.data.config.clone();
        let Some(name) = resolve_tool_name(&config, ctx.tools) else {
            let error = "no matching tool found for this node's configuration".to_string();
            let _ = ctx.sender.send(Chunk::ToolError { tool_name: "unknown".into(), error: error.clone() });
            return Err(conflux_types::Error::routing(error));
        };

        let auto_param_key = config_str(&config, "auto_param_key")
            .map(str::to_string)
            .unwrap_or_else(|| format!("auto_params_{}", node.id));
        let overridden = ctx.flow_state.get(&auto_param_key).cloned();

        let mut params = overridden
            .or_else(|| config_obj(&config, "params").map(|m| Value::Object(m.clone())))
            .unwrap_or_else(|| Value::Object(Default::default()));

        self.fill_missing_required(&name, &mut params, ctx);

        let result = match ctx.tools.execute(&name, params).await {
            Ok(result) => result,
            Err(e) => {
                let _ = ctx.sender.send(Chunk::ToolError { tool_name: name.clone(), error: e.to_string() });
                return Err(e);
            }
        };

        self.maybe_persist_search_result(&name, &node.id, &result, ctx);

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("tool_name".to_string(), Value::String(name.clone()));
        metadata.insert("tool_result".to_string(), result.clone());

        let _ = ctx.sender.send(Chunk::ToolResult { tool_name: name.clone(), result: result.clone(), metadata: metadata.clone() });
        let _ = ctx.sender.send(Chunk::Content { content: stringify(&result), metadata });

        let save_as = config_str(&config, "save_as").map(str::to_string);
        ctx.flow_state.save_output(&node.id, result.clone(), save_as.as_deref());
        Ok(result)
    }
}

impl ToolNode {
    /// Fills any required parameter that's missing or looks like an
    /// unfilled schema placeholder, in the documented fallback order:
    /// `message`, then `flow_state[param_name]`, then
    /// `flow_state.last_output`; plus the `report`-tool `file_names` ←
    /// `flow_state.saved_files` soft rule.
    fn fill_missing_required(&self, name: &str, params: &mut Value, ctx: &NodeContext<'_>) {
        let Some(tool) = ctx.tools.get(name) else { return };
        let schema = tool.parameters_schema();
        let required = required_fields(&schema);
        let map = params.as_object_mut().expect("params is always an object");

        for field in &required {
            let needs_fill = match map.get(field) {
                None => true,
                Some(v) if v.is_null() => true,
                Some(v) if looks_like_schema_object(v) => true,
                _ => false,
            };
            if !needs_fill {
                continue;
            }
            let fallback = ctx
                .flow_state
                .get(field)
                .cloned()
                .filter(|v| !looks_like_schema_object(v))
                .unwrap_or_else(|| {
                    if ctx.flow_state.last_output.is_null() {
                        Value::String(ctx.message.to_string())
                    } else {
                        ctx.flow_state.last_output.clone()
                    }
                });
            map.insert(field.clone(), fallback);
        }

        if name.to_lowercase().contains("report") {
            let needs_files = match map.get("file_names") {
                None => true,
                Some(Value::Array(a)) => a.is_empty(),
                _ => false,
            };
            if needs_files && !ctx.flow_state.saved_files.is_empty() {
                map.insert(
                    "file_names".to_string(),
                    Value::Array(ctx.flow_state.saved_files.iter().cloned().map(Value::String).collect()),
                );
            }
        }
    }

    /// ToolNode: search-like tool output gets persisted to a
    /// workspace file path recorded on `flow_state.saved_files` /
    /// `flow_state["{node_id}_file_path"]`. No real file is written here —
    /// `conflux-flow` has no storage handle plumbed through `NodeContext`
    /// (documented simplification, see DESIGN.md) — only the path bookkeeping
    /// downstream `report`-like tools rely on.
    fn maybe_persist_search_result(&self, name: &str, node_id: &str, result: &Value, ctx: &mut NodeContext<'_>) {
        let Some(tool) = ctx.tools.get(name) else { return };
        if !looks_like_search_tool(name, tool.description()) {
            return;
        }
        if !looks_like_search_results(result) {
            return;
        }
        let query = result
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or(ctx.message);
        let slug = slugify(query);
        let timestamp = conflux_types::now_millis();
        let path = format!("search_results/{slug}_{timestamp}.txt");
        ctx.flow_state.saved_files.push(path.clone());
        ctx.flow_state.set(format!("{node_id}_file_path"), Value::String(path));
    }
}

fn looks_like_search_results(result: &Value) -> bool {
    match result {
        Value::Object(map) => map.contains_key("results"),
        Value::Array(_) => true,
        _ => false,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

register_flow_node!("tool", "tool", ToolNode);

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
            id: "tool1".to_string(),
            category: Some("tool".into()),
            implementation: Some("tool".into()),
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
    async fn fills_required_param_from_message_and_executes() {
        let tools = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        tools.register(Arc::new(WebSearchTool), ToolType::Builtin);
        let llm = MockLlmProvider::new();
        let mut flow_state = FlowState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
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
        let out = ToolNode
            .execute_stream(&node_cfg(serde_json::json!({"tool_name": "web_search"})), &mut ctx)
            .await
            .unwrap();
        assert!(out.get("results").is_some());
        let mut saw_tool_result = false;
        while let Ok(chunk) = rx.try_recv() {
            if matches!(chunk, Chunk::ToolResult { .. }) {
                saw_tool_result = true;
            }
        }
        assert!(saw_tool_result);
    }

    #[tokio::test]
    async fn auto_param_override_wins_over_config_params() {
        let tools = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        tools.register(Arc::new(WebSearchTool), ToolType::Builtin);
        let llm = MockLlmProvider::new();
        let mut flow_state = FlowState::new();
        flow_state.set("auto_params_tool1", serde_json::json!({"query": "Sun Tzu"}));
        let (tx, _rx) = mpsc::unbounded_channel();
        let context = conflux_store::Context::new();
        let mut ctx = NodeContext {
            user_id: "u1",
            message: "irrelevant",
            agent_name: "a1",
            context: &context,
            flow_state: &mut flow_state,
            tools: &tools,
            llm: &llm,
            sender: tx,
        };
        let out = ToolNode
            .execute_stream(
                &node_cfg(serde_json::json!({"tool_name": "web_search", "params": {"query": "wrong"}})),
                &mut ctx,
            )
            .await
            .unwrap();
        assert_eq!(out.get("query").and_then(|v| v.as_str()), Some("Sun Tzu"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let tools = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        let llm = MockLlmProvider::new();
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
        let err = ToolNode
            .execute_stream(&node_cfg(serde_json::json!({"tool_name": "nope"})), &mut ctx)
            .await;
        assert!(err.is_err());
    }
}
