//! The C4 Flow Execution Engine and C5 Flow Nodes: a
//! directed-graph interpreter that drives typed nodes synchronously or in
//! streaming mode. Grounded throughout on
//! the original implementation and the
//! `agents/flow/nodes/*.py` node implementations, with the
//! `InternalRun`/mpsc-channel streaming idiom
//! (`packages/executor/src/streaming.rs`) for how chunks are produced.

pub mod chunk;
pub mod engine;
pub mod graph;
pub mod nodes;
pub mod registry;
pub mod state;

pub use chunk::Chunk;
pub use engine::{Engine, EngineHooks, NoopHooks};
pub use graph::Graph;
pub use registry::{NodeContext, NodeLogic};
pub use state::FlowState;

/// Registers every built-in C5 node kind with the inventory-backed node
/// registry. Call once at process startup (mirrors
/// `conflux_tools::discover_builtins`'s equivalent for tools); node
/// self-registration via `register_flow_node!` happens regardless, this
/// just forces the containing modules to be linked in.
pub fn ensure_nodes_linked() {
    nodes::touch();
}
