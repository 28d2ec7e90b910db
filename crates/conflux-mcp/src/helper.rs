//! The C2 surface from : `get_available_services`, `get_tools`,
//! `call_tool`, backed by persisted [`McpServerConfig`] records and the
//! lazy [`McpPool`].

use crate::config::McpServerConfig;
use crate::connection::ToolDescriptor;
use crate::pool::McpPool;
use conflux_types::Result;
use dashmap::DashMap;
use serde_json::Value;

pub struct McpHelper {
    servers: DashMap<String, McpServerConfig>,
    pool: McpPool,
}

impl McpHelper {
    pub fn new() -> Self {
        Self {
            servers: DashMap::new(),
            pool: McpPool::new(),
        }
    }

    pub fn register_server(&self, config: McpServerConfig) {
        self.servers.insert(config.name.clone(), config);
    }

    pub fn get_available_services(&self) -> Vec<String> {
        self.servers.iter().map(|e| e.key().clone()).collect()
    }

    pub async fn get_tools(&self, server_name: &str) -> Result<Vec<ToolDescriptor>> {
        let config = self.config_for(server_name)?;
        let connection = self.pool.get_or_connect(&config).await?;
        match connection.list_tools().await {
            Ok(tools) => Ok(tools),
            Err(e) => {
                self.pool.evict(server_name);
                Err(e)
            }
        }
    }

    pub async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value> {
        let config = self.config_for(server_name)?;
        let connection = self.pool.get_or_connect(&config).await?;
        match connection.call_tool(tool_name, arguments).await {
            Ok(result) => Ok(result),
            Err(e) => {
                // A failed call must not poison the pool — evict so the
                // next call reconnects instead of reusing a dead session,
                // but this call itself still surfaces the error.
                self.pool.evict(server_name);
                Err(e)
            }
        }
    }

    fn config_for(&self, server_name: &str) -> Result<McpServerConfig> {
        self.servers
            .get(server_name)
            .map(|e| e.value().clone())
            .ok_or_else(|| conflux_types::Error::routing(format!("unknown mcp server `{server_name}`")))
    }
}

impl Default for McpHelper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_server_is_routing_error() {
        let helper = McpHelper::new();
        let err = futures::executor::block_on(helper.call_tool("ghost", "x", Value::Null));
        assert!(matches!(err, Err(conflux_types::Error::Routing(_))));
    }

    #[test]
    fn registered_server_is_listed() {
        let helper = McpHelper::new();
        helper.register_server(McpServerConfig::streamable_http("search", "http://localhost:1234"));
        assert_eq!(helper.get_available_services(), vec!["search".to_string()]);
    }
}
