//! C5 Flow Node implementations: StartNode, EndNode, LlmNode,
//! RouterNode, ToolNode, AutoParamNode, CompositeNode, PlannerNode. Each
//! submodule self-registers with [`crate::registry`] via
//! [`crate::register_flow_node`]; `touch()` exists only to force this module
//! tree to link (and its `inventory::submit!` calls to run) in binaries that
//! otherwise never reference these types by name.

pub mod auto_param;
pub mod common;
pub mod composite;
pub mod llm;
pub mod planner;
pub mod router;
pub mod start_end;
pub mod tool;

pub use auto_param::AutoParamNode;
pub use composite::CompositeNode;
pub use llm::LlmNode;
pub use planner::PlannerNode;
pub use router::RouterNode;
pub use start_end::{EndNode, StartNode};
pub use tool::ToolNode;

pub fn touch() {}
