//! The C1 Tool Registry: a uniform interface over built-in, MCP, and
//! dynamically-defined ("temporary") tools, with scoring and availability
//! gating.

pub mod builtin;
pub mod builtins;
pub mod mcp_tool;
pub mod registry;
pub mod score;
pub mod temporary;
pub mod tool;

pub use builtin::{ToolConstructor, discover_builtins};
pub use mcp_tool::McpTool;
pub use registry::ToolRegistry;
pub use score::{InMemoryScoreStore, ScoreRecord, ScoreStore};
pub use temporary::TemporaryTool;
pub use tool::Tool;
