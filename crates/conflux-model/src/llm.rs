//! The LLM provider seam. The underlying LLM and embedding providers are
//! external collaborators whose *interface* only is defined
//! here — following the pattern of `ModelLogic` trait and `LLMCallback`
//! (`packages/model-provider/src/llm.rs`), simplified to plain text chunks
//! since multi-modal response assembly is the concern, not this
//! runtime's.

use crate::history::HistoryMessage;
use async_trait::async_trait;
use conflux_types::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// One incremental piece of a streamed completion.
#[derive(Debug, Clone, Default)]
pub struct LlmChunk {
    pub delta: String,
    pub finished: bool,
}

/// Invoked once per streamed chunk; mirrors the `LLMCallback`.
pub type LlmStreamCallback =
    Arc<dyn Fn(LlmChunk) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<HistoryMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub deadline: Option<Duration>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<HistoryMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            deadline: None,
        }
    }
}

/// A chat-completion backend. Implementations wrap whatever real provider
/// (OpenAI, Anthropic, a local llama.cpp server, …) the deployment wires in;
/// this crate ships only [`mock::MockLlmProvider`] for tests.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Buffers the full completion and returns it (non-streaming chat path,
    ///  `stream=false`).
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Streams the completion, invoking `callback` once per chunk, and
    /// returns the fully accumulated text.
    async fn complete_stream(
        &self,
        request: CompletionRequest,
        callback: LlmStreamCallback,
    ) -> Result<String>;
}

/// Runs `complete_stream` under `request.deadline` if set, surfacing a
/// `DependencyError` on timeout.
pub async fn complete_stream_with_deadline(
    provider: &dyn LlmProvider,
    request: CompletionRequest,
    callback: LlmStreamCallback,
) -> Result<String> {
    match request.deadline {
        Some(deadline) => {
            match tokio::time::timeout(deadline, provider.complete_stream(request, callback)).await
            {
                Ok(result) => result,
                Err(_) => Err(conflux_types::Error::dependency("llm call timed out")),
            }
        }
        None => provider.complete_stream(request, callback).await,
    }
}
