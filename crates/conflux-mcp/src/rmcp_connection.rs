//! The real transport: a `streamable_http` MCP session via `rmcp`, grounded
//! on the `packages/catalog/llm/src/agent/register_mcp_tools.rs`
//! (`StreamableHttpClientTransport` + `ServiceExt::serve`).

use crate::connection::{McpConnection, ToolDescriptor};
use async_trait::async_trait;
use conflux_types::Result;
use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParam, ClientCapabilities, ClientInfo, Implementation};
use rmcp::transport::StreamableHttpClientTransport;
use serde_json::Value;
use tokio::sync::Mutex;

pub struct StreamableHttpConnection {
    session: Mutex<rmcp::service::RunningService<rmcp::RoleClient, ClientInfo>>,
}

impl StreamableHttpConnection {
    pub async fn connect(url: &str) -> Result<Self> {
        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        let client_info = ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "conflux".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        };
        let session = client_info
            .serve(transport)
            .await
            .map_err(|e| conflux_types::Error::dependency(format!("mcp connect: {e}")))?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

#[async_trait]
impl McpConnection for StreamableHttpConnection {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let session = self.session.lock().await;
        let tools = session
            .list_tools(Default::default())
            .await
            .map_err(|e| conflux_types::Error::dependency(format!("mcp list_tools: {e}")))?;
        Ok(tools
            .tools
            .into_iter()
            .map(|t| ToolDescriptor {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                input_schema: serde_json::to_value(&t.input_schema).unwrap_or(Value::Null),
            })
            .collect())
    }

    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value> {
        let session = self.session.lock().await;
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                Some(map)
            }
        };
        let result = session
            .call_tool(CallToolRequestParam {
                name: tool_name.to_string().into(),
                arguments,
            })
            .await
            .map_err(|e| conflux_types::Error::dependency(format!("mcp call_tool: {e}")))?;
        serde_json::to_value(&result)
            .map_err(|e| conflux_types::Error::data_shape(format!("mcp result encode: {e}")))
    }
}
