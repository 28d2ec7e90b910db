//! RouterNode, grounded on
//! the original implementation:
//! evaluates `routing_logic` against `flow_state[field]` and writes
//! `flow_state.router_decision` for the engine to branch on.

use crate::register_flow_node;
use crate::registry::{NodeContext, NodeLogic};
use crate::state::RouterDecision;
use async_trait::async_trait;
use conflux_types::Result;
use conflux_types::model::NodeCfg;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

#[derive(Default)]
pub struct RouterNode;

#[async_trait]
impl NodeLogic for RouterNode {
    fn category(&self) -> &'static str {
        "router"
    }

    fn implementation(&self) -> &'static str {
        "router"
    }

    async fn execute_stream(&self, node: &NodeCfg, ctx: &mut NodeContext<'_>) -> Result<Value> {
        let logic = node.data.config.get("routing_logic").cloned().unwrap_or(Value::Null);
        let field = logic.get("field").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let value = ctx.flow_state.get(&field).cloned().unwrap_or(Value::Null);
        let selected_branch = evaluate(&value, &logic);

        ctx.flow_state.router_decision = Some(RouterDecision {
            field: field.clone(),
            value: value.clone(),
            selected_branch,
        });

        Ok(Value::Bool(selected_branch))
    }
}

register_flow_node!("router", "router", RouterNode);

/// RouterNode evaluation rules, checked in order:
/// explicit `value` equality, boolean truthiness, numeric operator against
/// `threshold`, string `pattern` regex search, else non-empty truthiness.
fn evaluate(value: &Value, logic: &Value) -> bool {
    if let Some(expected) = logic.get("value") {
        if !expected.is_null() {
            return value == expected;
        }
    }
    if let Value::Bool(b) = value {
        return *b;
    }
    if let Some(n) = value.as_f64() {
        let operator = logic.get("operator").and_then(|v| v.as_str()).unwrap_or("==");
        let threshold = logic.get("threshold").and_then(|v| v.as_f64()).unwrap_or(0.0);
        return match operator {
            ">" => n > threshold,
            ">=" => n >= threshold,
            "<" => n < threshold,
            "<=" => n <= threshold,
            "==" => (n - threshold).abs() < f64::EPSILON,
            _ => n >= threshold,
        };
    }
    if let Value::String(s) = value {
        if let Some(pattern) = logic.get("pattern").and_then(|v| v.as_str()) {
            static CACHE: OnceCell<std::sync::Mutex<std::collections::HashMap<String, Regex>>> = OnceCell::new();
            let cache = CACHE.get_or_init(|| std::sync::Mutex::new(std::collections::HashMap::new()));
            let mut guard = cache.lock().unwrap();
            let re = guard.entry(pattern.to_string()).or_insert_with(|| {
                Regex::new(pattern).unwrap_or_else(|_| Regex::new("$^").unwrap())
            });
            return re.is_match(s);
        }
        return !s.is_empty();
    }
    is_truthy(value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_threshold_gte() {
        let logic = serde_json::json!({"field": "score", "operator": ">=", "threshold": 3});
        assert!(evaluate(&serde_json::json!(4), &logic));
        assert!(!evaluate(&serde_json::json!(2), &logic));
    }

    #[test]
    fn explicit_value_equality() {
        let logic = serde_json::json!({"field": "status", "value": "done"});
        assert!(evaluate(&serde_json::json!("done"), &logic));
        assert!(!evaluate(&serde_json::json!("pending"), &logic));
    }

    #[test]
    fn bool_truthiness() {
        let logic = serde_json::json!({"field": "flag"});
        assert!(evaluate(&serde_json::json!(true), &logic));
        assert!(!evaluate(&serde_json::json!(false), &logic));
    }

    #[test]
    fn string_pattern_regex() {
        let logic = serde_json::json!({"field": "text", "pattern": "^foo"});
        assert!(evaluate(&serde_json::json!("foobar"), &logic));
        assert!(!evaluate(&serde_json::json!("barfoo"), &logic));
    }

    #[test]
    fn non_empty_string_is_truthy_without_pattern() {
        let logic = serde_json::json!({"field": "text"});
        assert!(evaluate(&serde_json::json!("anything"), &logic));
        assert!(!evaluate(&serde_json::json!(""), &logic));
    }
}
