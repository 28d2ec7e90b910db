use crate::register_builtin_tool;
use crate::tool::Tool;
use async_trait::async_trait;
use conflux_types::Result;
use serde_json::Value;
use std::sync::Arc;

/// A stand-in search tool:
/// returns a deterministic placeholder result so the auto-param and
/// tool-node wiring can be exercised without a network dependency.
pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for a query and return a short summary of results."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn call(&self, params: Value) -> Result<Value> {
        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| conflux_types::Error::execution("web_search requires `query`"))?;
        if query.trim().is_empty() {
            return Ok(Value::String("not found: empty query".into()));
        }
        Ok(serde_json::json!({
            "query": query,
            "results": [
                { "title": format!("About: {query}"), "snippet": format!("Summary information about {query}.") }
            ]
        }))
    }
}

register_builtin_tool!(|| Arc::new(WebSearchTool) as Arc<dyn Tool>);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_query_looks_like_not_found() {
        let tool = WebSearchTool;
        let result = tool.call(serde_json::json!({"query": ""})).await.unwrap();
        assert!(crate::tool::looks_like_soft_failure("web_search", &result));
    }
}
