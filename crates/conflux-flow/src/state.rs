//! `flow_state`: the mutable scratchpad threaded through a single run, per
//!  ("flow_state.nodes[node_id].outputs", "flow_state.last_output",
//! "flow_state.router_decision", "flow_state.saved_files", `{{name}}`
//! template substitution against it).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeOutputs {
    pub outputs: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RouterDecision {
    pub field: String,
    pub value: serde_json::Value,
    pub selected_branch: bool,
}

/// Plain variable bag keyed by name, plus the node-scoped outputs map the
/// engine appends to after every node executes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlowState {
    #[serde(flatten)]
    pub vars: HashMap<String, serde_json::Value>,
    pub nodes: HashMap<String, NodeOutputs>,
    pub last_output: serde_json::Value,
    pub router_decision: Option<RouterDecision>,
    pub saved_files: Vec<String>,
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.vars.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.vars.insert(key.into(), value);
    }

    /// Appends to a node's per-node outputs list, updates `last_output`,
    /// and (if `save_as` is set) also writes that key — 
    /// `save_output` contract.
    pub fn save_output(&mut self, node_id: &str, output: serde_json::Value, save_as: Option<&str>) {
        self.nodes.entry(node_id.to_string()).or_default().outputs.push(output.clone());
        self.last_output = output.clone();
        if let Some(save_as) = save_as {
            self.vars.insert(save_as.to_string(), output);
        }
    }

    pub fn node_outputs(&self, node_id: &str) -> &[serde_json::Value] {
        self.nodes.get(node_id).map(|n| n.outputs.as_slice()).unwrap_or(&[])
    }

    /// Renders `{{name}}` placeholders in `template` against the flow's
    /// variables and the current `message`.
    pub fn render_template(&self, template: &str, message: &str) -> String {
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_\.]+)\s*\}\}").unwrap());
        re.replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            if name == "message" {
                return message.to_string();
            }
            self.value_as_text(name).unwrap_or_default()
        })
        .into_owned()
    }

    fn value_as_text(&self, name: &str) -> Option<String> {
        if name == "last_output" {
            return Some(stringify(&self.last_output));
        }
        self.vars.get(name).map(stringify)
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_template_substitutes_message_and_vars() {
        let mut state = FlowState::new();
        state.set("topic", serde_json::json!("rust"));
        let rendered = state.render_template("talk about {{topic}}: {{message}}", "hello");
        assert_eq!(rendered, "talk about rust: hello");
    }

    #[test]
    fn save_output_updates_last_output_and_node_outputs() {
        let mut state = FlowState::new();
        state.save_output("n1", serde_json::json!("result"), Some("answer"));
        assert_eq!(state.last_output, serde_json::json!("result"));
        assert_eq!(state.node_outputs("n1"), &[serde_json::json!("result")]);
        assert_eq!(state.get("answer"), Some(&serde_json::json!("result")));
    }
}
