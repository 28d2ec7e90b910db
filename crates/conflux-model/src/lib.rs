//! Provider-agnostic LLM/embedding traits and conversation history shared by
//! `conflux-agents`, `conflux-flow`, and `conflux-kb`. Real providers (OpenAI,
//! Anthropic, a local embedding server, …) are external collaborators per
//!  — this crate defines only the seam and a deterministic mock
//! used across the workspace's test suites.

pub mod embedding;
pub mod history;
pub mod json_extract;
pub mod llm;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use embedding::EmbeddingProvider;
pub use history::{History, HistoryMessage, Role, ToolCall};
pub use json_extract::extract_json;
pub use llm::{CompletionRequest, LlmChunk, LlmProvider, LlmStreamCallback};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockEmbeddingProvider, MockLlmProvider};
