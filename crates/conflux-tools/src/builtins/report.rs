use crate::register_builtin_tool;
use crate::tool::Tool;
use async_trait::async_trait;
use conflux_types::Result;
use serde_json::Value;
use std::sync::Arc;

/// A `report`-like tool.
/// Just stitches the named files into a fake report body.
pub struct ReportTool;

#[async_trait]
impl Tool for ReportTool {
    fn name(&self) -> &str {
        "generate_report"
    }

    fn description(&self) -> &str {
        "Assemble a report from previously saved files."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_names": { "type": "array", "items": { "type": "string" } },
                "title": { "type": "string" }
            },
            "required": ["file_names"]
        })
    }

    async fn call(&self, params: Value) -> Result<Value> {
        let files: Vec<String> = params
            .get("file_names")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if files.is_empty() {
            return Ok(serde_json::json!({"error": "no files to report on"}));
        }
        let title = params
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Report");
        Ok(serde_json::json!({
            "title": title,
            "sections": files,
        }))
    }
}

register_builtin_tool!(|| Arc::new(ReportTool) as Arc<dyn Tool>);
