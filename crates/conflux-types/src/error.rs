//! Behavioral error taxonomy (spec §7). Each variant maps to exactly one of
//! the documented categories so callers at the HTTP edge (`conflux-api`) can
//! translate it to a status code without re-deriving the mapping, and callers
//! inside a flow (`conflux-flow`) can translate it to a `node_error` chunk.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid or missing agent/flow/tool/MCP record.
    #[error("config error: {0}")]
    Config(String),

    /// Selected agent/tool/route not found.
    #[error("not found: {0}")]
    Routing(String),

    /// LLM/embedding/MCP call failed or timed out.
    #[error("dependency failed: {0}")]
    Dependency(String),

    /// A tool raised or returned a soft failure.
    #[error("tool execution failed: {0}")]
    Execution(String),

    /// Exhausted inside a planner retry loop.
    #[error("planner retries exhausted after {attempts} attempts: {last}")]
    PlannerRetryable { attempts: u32, last: String },

    /// An LLM produced unparseable JSON where JSON was required and no
    /// documented fallback applied.
    #[error("unparseable model output: {0}")]
    DataShape(String),

    /// A persisted snapshot was corrupt, partial, or missing required
    /// fields; callers should treat this as "no snapshot" rather than fail.
    #[error("inconsistent snapshot: {0}")]
    Consistency(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn routing(msg: impl Into<String>) -> Self {
        Error::Routing(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Error::Dependency(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }

    pub fn data_shape(msg: impl Into<String>) -> Self {
        Error::DataShape(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Error::Consistency(msg.into())
    }

    /// Category label used in `node_error`/`error` chunk metadata so clients
    /// can branch on taxonomy without string-matching the message.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Routing(_) => "routing",
            Error::Dependency(_) => "dependency",
            Error::Execution(_) => "execution",
            Error::PlannerRetryable { .. } => "planner_retryable",
            Error::DataShape(_) => "data_shape",
            Error::Consistency(_) => "consistency",
            Error::Other(_) => "internal",
        }
    }
}

impl fmt::Display for &Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self)
    }
}
