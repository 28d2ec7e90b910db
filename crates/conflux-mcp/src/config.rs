//! MCP server configuration, as persisted by whatever CRUD surface backs
//! `/api/mcp`. Transport implementations themselves are out of
//! scope per ; `stdio`/`websocket` are accepted here as config
//! shapes but only `sse`/`streamable_http` are actually dialed (the only
//! client transports the workspace's `rmcp` feature set enables) — any
//! other transport surfaces a `ConfigError` at connect time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Stdio,
    Sse,
    WebSocket,
    StreamableHttp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub transport: TransportKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl McpServerConfig {
    pub fn streamable_http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportKind::StreamableHttp,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            url: Some(url.into()),
        }
    }
}
