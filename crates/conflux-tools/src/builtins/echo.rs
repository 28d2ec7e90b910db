use crate::register_builtin_tool;
use crate::tool::Tool;
use async_trait::async_trait;
use conflux_types::Result;
use serde_json::Value;
use std::sync::Arc;

/// Returns its input verbatim. Useful as a deterministic building block in
/// flow/planner tests.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back unchanged."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn call(&self, params: Value) -> Result<Value> {
        let text = params.get("text").cloned().unwrap_or(Value::Null);
        Ok(text)
    }
}

register_builtin_tool!(|| Arc::new(EchoTool) as Arc<dyn Tool>);
