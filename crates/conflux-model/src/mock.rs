//! Deterministic test doubles for [`LlmProvider`]/[`EmbeddingProvider`].
//! Other crates' test suites depend on `conflux-model` (dev-dependency) for
//! these rather than hand-rolling stubs, so a mocked LLM produces
//! byte-identical, deterministic chunks across test runs.

use crate::embedding::EmbeddingProvider;
use crate::llm::{CompletionRequest, LlmChunk, LlmProvider, LlmStreamCallback};
use async_trait::async_trait;
use conflux_types::Result;

/// Returns a fixed response, or (if `canned` is empty) echoes the last user
/// message, streamed one word at a time.
pub struct MockLlmProvider {
    canned: Option<String>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self { canned: None }
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            canned: Some(response.into()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        Ok(self.response_for(&request))
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
        callback: LlmStreamCallback,
    ) -> Result<String> {
        let full = self.response_for(&request);
        for word in full.split_inclusive(' ') {
            callback(LlmChunk {
                delta: word.to_string(),
                finished: false,
            })
            .await?;
        }
        callback(LlmChunk {
            delta: String::new(),
            finished: true,
        })
        .await?;
        Ok(full)
    }
}

impl MockLlmProvider {
    fn response_for(&self, request: &CompletionRequest) -> String {
        if let Some(canned) = &self.canned {
            return canned.clone();
        }
        request
            .messages
            .last()
            .map(|m| format!("echo: {}", m.content))
            .unwrap_or_default()
    }
}

/// A hashing "embedding" (not semantically meaningful, but deterministic and
/// stable across calls) so tests can exercise similarity ranking without a
/// real model.
pub struct MockEmbeddingProvider {
    dims: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(32)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dims)).collect())
    }
}

fn hash_embed(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    for (i, token) in text.split_whitespace().enumerate() {
        let mut hash: u64 = 1469598103934665603;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        let slot = (hash as usize + i) % dims;
        vector[slot] += 1.0;
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_llm_streams_then_returns_full_text() {
        let provider = MockLlmProvider::with_response("hello world");
        let collected = std::sync::Arc::new(tokio::sync::Mutex::new(String::new()));
        let collected2 = collected.clone();
        let callback: LlmStreamCallback = std::sync::Arc::new(move |chunk| {
            let collected = collected2.clone();
            Box::pin(async move {
                collected.lock().await.push_str(&chunk.delta);
                Ok(())
            })
        });
        let request = CompletionRequest::new(vec![]);
        let full = provider.complete_stream(request, callback).await.unwrap();
        assert_eq!(full, "hello world");
        assert_eq!(*collected.lock().await, "hello world");
    }

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let provider = MockEmbeddingProvider::new(16);
        let a = provider.embed_query("same text here").await.unwrap();
        let b = provider.embed_query("same text here").await.unwrap();
        assert_eq!(a, b);
    }
}
