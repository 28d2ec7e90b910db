//! MCP (Model Context Protocol) server connectivity: server
//! configuration, a lazily-connected per-server pool, and the
//! `get_available_services`/`get_tools`/`call_tool` surface the tool
//! registry (`conflux-tools`) wraps as an MCP tool kind.

pub mod config;
pub mod connection;
pub mod helper;
pub mod pool;
pub mod rmcp_connection;

pub use config::{McpServerConfig, TransportKind};
pub use connection::{McpConnection, ToolDescriptor};
pub use helper::McpHelper;
pub use pool::McpPool;
