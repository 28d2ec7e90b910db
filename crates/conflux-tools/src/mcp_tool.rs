//! Wraps one MCP server tool as a [`Tool`], translating `execute(params)`
//! into `mcp.call_tool(server, tool, params)`.

use crate::tool::Tool;
use async_trait::async_trait;
use conflux_mcp::McpHelper;
use conflux_types::Result;
use serde_json::Value;
use std::sync::Arc;

pub struct McpTool {
    /// Registry-facing name, `mcp_{server}_{tool}` per  ToolNode
    /// resolution order.
    name: String,
    server: String,
    tool_name: String,
    description: String,
    parameters_schema: Value,
    helper: Arc<McpHelper>,
}

impl McpTool {
    pub fn new(
        server: impl Into<String>,
        tool_name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        helper: Arc<McpHelper>,
    ) -> Self {
        let server = server.into();
        let tool_name = tool_name.into();
        let name = format!("mcp_{server}_{tool_name}");
        Self {
            name,
            server,
            tool_name,
            description: description.into(),
            parameters_schema,
            helper,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn call(&self, params: Value) -> Result<Value> {
        self.helper
            .call_tool(&self.server, &self.tool_name, params)
            .await
    }
}
