//! The C6 Agent Layer: [`GeneralAgent`] (prompt the LLM, optionally invoke
//! bound tools, refine once against an unsatisfied result) and
//! [`FlowDrivenAgent`] (drive a bound [`conflux_flow::Engine`]), sharing a
//! single [`AgentRuntime`] for per-`(agent, user)` conversation state and
//! pipeline storage, grounded on
//! the original implementation,general_agent,flow_driven_agent}.py`.

pub mod flow_driven;
pub mod general;
pub mod runtime;

pub use flow_driven::{AgentHooks, FlowDrivenAgent, MessageNodeSink};
pub use general::GeneralAgent;
pub use runtime::{AgentContextState, AgentRuntime, KnowledgeQuerier, SessionHistorySource};
