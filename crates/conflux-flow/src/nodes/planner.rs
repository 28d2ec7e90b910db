//! PlannerNode, grounded on
//! the original implementation: asks
//! the LLM to lay out a short straight-line chain of tool calls from the
//! registry (grouped by tool type), expands that chain into real ToolNode
//! (preceded by an AutoParamNode when no params were given) sub-nodes,
//! reports them via `FlowNodesExtend`, and walks them in-process against the
//! live `flow_state` — so the outer graph's own wiring past this node still
//! reaches the real end node once the planner returns (see DESIGN.md).

use crate::chunk::Chunk;
use crate::nodes::auto_param::AutoParamNode;
use crate::nodes::common::config_str;
use crate::nodes::tool::ToolNode;
use crate::register_flow_node;
use crate::registry::{NodeContext, NodeLogic};
use async_trait::async_trait;
use conflux_model::llm::CompletionRequest;
use conflux_model::{HistoryMessage, extract_json};
use conflux_types::Result;
use conflux_types::model::{EdgeCfg, NodeCfg, NodeData};
use serde_json::Value;

const DEFAULT_MAX_RETRIES: usize = 2;

#[derive(Default)]
pub struct PlannerNode;

#[async_trait]
impl NodeLogic for PlannerNode {
    fn category(&self) -> &'static str {
        "planner"
    }

    fn implementation(&self) -> &'static str {
        "planner"
    }

    async fn execute_stream(&self, node: &NodeCfg, ctx: &mut NodeContext<'_>) -> Result<Value> {
        let config = node.data.config.clone();
        let goal = config_str(&config, "goal").unwrap_or(ctx.message).to_string();
        let max_retries = config
            .get("max_retries")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let catalog = tool_catalog_by_type(ctx.tools);
        let mut error_context = String::new();

        for retry_index in 0..=max_retries {
            let plan = self.ask_for_plan(&goal, &catalog, &error_context, ctx).await;
            let (sub_nodes, edges) = expand_plan(&node.id, retry_index, &plan);

            if sub_nodes.is_empty() {
                continue;
            }

            let _ = ctx.sender.send(Chunk::FlowNodesExtend {
                parent_node_id: node.id.clone(),
                nodes: sub_nodes.clone(),
                edges: edges.clone(),
                metadata: Default::default(),
            });

            match run_chain(&sub_nodes, ctx).await {
                Ok(output) => {
                    ctx.flow_state.save_output(&node.id, output.clone(), config_str(&config, "save_as"));
                    return Ok(output);
                }
                Err(e) => {
                    error_context = format!("previous attempt failed: {e}");
                    continue;
                }
            }
        }

        Err(conflux_types::Error::execution(format!(
            "planner exhausted {max_retries} retries without a successful plan"
        )))
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct PlannedStep {
    tool_name: String,
    #[serde(default)]
    params: Option<Value>,
}

impl PlannerNode {
    async fn ask_for_plan(
        &self,
        goal: &str,
        catalog: &[(String, Vec<String>)],
        error_context: &str,
        ctx: &NodeContext<'_>,
    ) -> Vec<PlannedStep> {
        let catalog_text = catalog
            .iter()
            .map(|(ty, names)| format!("{ty}: {}", names.join(", ")))
            .collect::<Vec<_>>()
            .join("\n");
        let system = "You plan a short straight-line sequence of tool calls to satisfy a goal. \
                      Respond with a JSON array only, each item `{\"tool_name\": ..., \"params\": {...}}`. \
                      No tool calls needed means an empty array.";
        let user = format!(
            "goal:\n{goal}\n\navailable_tools_by_type:\n{catalog_text}\n\n{error_context}"
        );
        let request = CompletionRequest::new(vec![HistoryMessage::system(system), HistoryMessage::user(user)]);
        let Ok(response) = ctx.llm.complete(request).await else {
            return Vec::new();
        };
        match extract_json(&response) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn tool_catalog_by_type(tools: &conflux_tools::ToolRegistry) -> Vec<(String, Vec<String>)> {
    let mut grouped: std::collections::BTreeMap<String, Vec<String>> = std::collections::BTreeMap::new();
    for info in tools.list(None) {
        let type_key = format!("{:?}", info.tool_type).to_lowercase();
        grouped.entry(type_key).or_default().push(info.name);
    }
    grouped.into_iter().collect()
}

/// Expands planned steps into `(ToolNode[, AutoParamNode])` sub-node chains,
/// namespaced `{planner_id}_retry_{retry_index}_{step}[_auto]`, wired serially.
fn expand_plan(planner_id: &str, retry_index: usize, plan: &[PlannedStep]) -> (Vec<NodeCfg>, Vec<EdgeCfg>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut previous_id: Option<String> = None;

    for (step_index, step) in plan.iter().enumerate() {
        let tool_node_id = format!("{planner_id}_retry_{retry_index}_{step_index}");

        let params_provided = step.params.as_ref().map(|v| !v.is_null()).unwrap_or(false);
        if !params_provided {
            let auto_id = format!("{tool_node_id}_auto");
            let auto_node = NodeCfg {
                id: auto_id.clone(),
                category: Some("auto_param".into()),
                implementation: Some("auto_param".into()),
                data: NodeData {
                    config: serde_json::json!({
                        "tool_name": step.tool_name,
                        "target_tool_node_id": tool_node_id,
                    }),
                    ..Default::default()
                },
                position: None,
                connections: vec![tool_node_id.clone()],
            };
            if let Some(prev) = &previous_id {
                edges.push(EdgeCfg { source: prev.clone(), target: auto_id.clone(), source_handle: None, source_index: None });
            }
            nodes.push(auto_node);
            previous_id = Some(auto_id);
        }

        let tool_config = if params_provided {
            serde_json::json!({ "tool_name": step.tool_name, "params": step.params })
        } else {
            serde_json::json!({ "tool_name": step.tool_name, "auto_param_key": format!("auto_params_{tool_node_id}") })
        };
        let tool_node = NodeCfg {
            id: tool_node_id.clone(),
            category: Some("tool".into()),
            implementation: Some("tool".into()),
            data: NodeData { config: tool_config, ..Default::default() },
            position: None,
            connections: vec![],
        };
        if let Some(prev) = &previous_id {
            if prev != &tool_node_id {
                edges.push(EdgeCfg { source: prev.clone(), target: tool_node_id.clone(), source_handle: None, source_index: None });
            }
        }
        nodes.push(tool_node);
        previous_id = Some(tool_node_id);
    }

    (nodes, edges)
}

/// Sequentially executes the generated chain against the live `flow_state`,
/// dispatching each sub-node through its own [`NodeLogic`] directly (not via
/// the registry lookup, since the chain only ever contains tool/auto_param
/// nodes this function itself constructed).
async fn run_chain(sub_nodes: &[NodeCfg], ctx: &mut NodeContext<'_>) -> Result<Value> {
    let mut last_output = Value::Null;
    for sub_node in sub_nodes {
        let (sub_tx, mut sub_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sub_ctx = NodeContext {
            user_id: ctx.user_id,
            message: ctx.message,
            agent_name: ctx.agent_name,
            context: ctx.context,
            flow_state: &mut *ctx.flow_state,
            tools: ctx.tools,
            llm: ctx.llm,
            sender: sub_tx,
        };
        let result = match sub_node.category.as_deref() {
            Some("auto_param") => AutoParamNode.execute_stream(sub_node, &mut sub_ctx).await,
            _ => ToolNode.execute_stream(sub_node, &mut sub_ctx).await,
        };
        while let Ok(chunk) = sub_rx.try_recv() {
            let _ = ctx.sender.send(chunk);
        }
        last_output = result?;
    }
    Ok(last_output)
}

register_flow_node!("planner", "planner", PlannerNode);

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
            id: "plan1".to_string(),
            category: Some("planner".into()),
            implementation: Some("planner".into()),
            data: NodeData { config, ..Default::default() },
            position: None,
            connections: vec![],
        }
    }

    #[tokio::test]
    async fn generates_and_runs_a_single_step_plan() {
        let tools = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        tools.register(Arc::new(WebSearchTool), ToolType::Builtin);
        let llm = MockLlmProvider::with_response(r#"[{"tool_name": "web_search", "params": {"query": "Sun Tzu"}}]"#);
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
        let out = PlannerNode.execute_stream(&node_cfg(serde_json::json!({})), &mut ctx).await.unwrap();
        assert!(out.get("results").is_some());
        let mut saw_extend = false;
        while let Ok(chunk) = rx.try_recv() {
            if matches!(chunk, Chunk::FlowNodesExtend { .. }) {
                saw_extend = true;
            }
        }
        assert!(saw_extend);
    }

    #[tokio::test]
    async fn empty_plan_is_retried_then_errors() {
        let tools = ToolRegistry::new(Arc::new(InMemoryScoreStore::new()));
        let llm = MockLlmProvider::with_response("[]");
        let mut flow_state = FlowState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let context = conflux_store::Context::new();
        let mut ctx = NodeContext {
            user_id: "u1",
            message: "do nothing",
            agent_name: "a1",
            context: &context,
            flow_state: &mut flow_state,
            tools: &tools,
            llm: &llm,
            sender: tx,
        };
        let err = PlannerNode
            .execute_stream(&node_cfg(serde_json::json!({"max_retries": 1})), &mut ctx)
            .await;
        assert!(err.is_err());
    }
}
