//! The per-server connection surface. Kept as a trait so the pool (and
//! tests) don't depend on the concrete `rmcp` session type, wrapping the
//! transport-specific client behind a small `ModelLogic`-style trait
//! (`packages/model-provider/src/llm.rs`).

use async_trait::async_trait;
use conflux_types::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait McpConnection: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;
    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value>;
}
