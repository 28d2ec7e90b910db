//! The tool interface. Grounded on the `NodeLogic` trait
//! (`packages/catalog/core`) — here narrowed to a single async call instead
//! of a pin-graph `run`, since tools here are a flat
//! `execute(name, params) -> result` surface, not nodes with pins.

use async_trait::async_trait;
use conflux_types::Result;
use conflux_types::model::ContainerType;
use serde_json::Value;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// JSON Schema for `params`, exported via `schemars` rather than
    /// reflective attribute scraping.
    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {}, "required": [] })
    }

    fn container_type(&self) -> ContainerType {
        ContainerType::None
    }

    async fn call(&self, params: Value) -> Result<Value>;
}

/// Inspects a successful tool result for soft-failure heuristics:
/// `{error: …}` shapes, failure keywords in string results, and
/// `web_search`-style "not found" results.
pub fn looks_like_soft_failure(tool_name: &str, result: &Value) -> bool {
    if let Value::Object(map) = result {
        if map.contains_key("error") {
            return true;
        }
    }
    let text = match result {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let lowered = text.to_lowercase();
    const FAILURE_KEYWORDS: &[&str] = &[
        "failed",
        "failure",
        "error occurred",
        "could not",
        "unable to",
        "exception",
    ];
    if FAILURE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return true;
    }
    if tool_name.to_lowercase().contains("search") && lowered.trim_start().starts_with("not found")
    {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_object_is_soft_failure() {
        assert!(looks_like_soft_failure(
            "any_tool",
            &serde_json::json!({"error": "boom"})
        ));
    }

    #[test]
    fn search_not_found_is_soft_failure() {
        assert!(looks_like_soft_failure(
            "web_search",
            &serde_json::json!("not found: no results")
        ));
    }

    #[test]
    fn ordinary_result_is_not_soft_failure() {
        assert!(!looks_like_soft_failure(
            "web_search",
            &serde_json::json!("Sun Tzu was a military strategist")
        ));
    }
}
