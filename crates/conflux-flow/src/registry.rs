//! The Node Registry: instantiates a [`NodeLogic`] from a node's
//! `(category, implementation)` pair, following the pattern of
//! `FlowNodeRegistryInner`/`NodeLogic` + `register_node!`/`inventory`
//! self-registration pattern (`packages/core/src/state.rs`), adapted from
//! the board-node catalog to conflux's fixed C5 node kinds.

use crate::chunk::Chunk;
use crate::state::FlowState;
use async_trait::async_trait;
use conflux_types::Result;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Everything a node needs to execute one step:
/// `(user_id, message, context, agent_name)` plus the engine's shared
/// services and the per-run mutable `flow_state`.
pub struct NodeContext<'a> {
    pub user_id: &'a str,
    pub message: &'a str,
    pub agent_name: &'a str,
    pub context: &'a conflux_store::Context,
    pub flow_state: &'a mut FlowState,
    pub tools: &'a conflux_tools::ToolRegistry,
    pub llm: &'a dyn conflux_model::llm::LlmProvider,
    pub sender: UnboundedSender<Chunk>,
}

#[async_trait]
pub trait NodeLogic: Send + Sync {
    fn category(&self) -> &'static str;
    fn implementation(&self) -> &'static str;

    /// Whether this node requires an external environment to be mounted
    /// before it can run.
    fn requires_mount(&self) -> bool {
        false
    }

    /// Runs the node to completion, streaming chunks through
    /// `ctx.sender` and returning the node's own output value (used for
    /// `save_output`/accumulation bookkeeping by the engine).
    async fn execute_stream(&self, node: &conflux_types::model::NodeCfg, ctx: &mut NodeContext<'_>) -> Result<serde_json::Value>;
}

pub struct NodeConstructor {
    pub category: &'static str,
    pub implementation: &'static str,
    pub constructor: fn() -> Arc<dyn NodeLogic>,
}

inventory::collect!(NodeConstructor);

/// Registers a node kind for discovery, matching
/// `register_node!` macro.
#[macro_export]
macro_rules! register_flow_node {
    ($category:expr, $implementation:expr, $ty:ty) => {
        ::inventory::submit! {
            $crate::registry::NodeConstructor {
                category: $category,
                implementation: $implementation,
                constructor: || ::std::sync::Arc::new(<$ty>::default()) as ::std::sync::Arc<dyn $crate::registry::NodeLogic>,
            }
        }
    };
}

pub fn discover_nodes() -> Vec<&'static NodeConstructor> {
    inventory::iter::<NodeConstructor>().collect()
}

pub fn find_node(category: Option<&str>, implementation: Option<&str>) -> Option<Arc<dyn NodeLogic>> {
    discover_nodes()
        .into_iter()
        .find(|c| {
            implementation.map(|i| i == c.implementation).unwrap_or(false)
                || (implementation.is_none() && category == Some(c.category))
        })
        .map(|c| (c.constructor)())
}
