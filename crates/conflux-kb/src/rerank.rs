//! Reranking seam. This crate ships no actual
//! cross-encoder model — the common stack has no such dependency
//! either — so `PassthroughReranker` preserves recall order while still
//! exercising the trait boundary a real reranker plugs into.

use async_trait::async_trait;
use conflux_types::Result;

#[async_trait]
pub trait Reranker: Send + Sync {
    /// `candidates` are `(chunk_id, content)` pairs; returns `(chunk_id,
    /// rerank_score)` pairs, order not required to match input order.
    async fn rerank(&self, query: &str, candidates: &[(String, String)]) -> Result<Vec<(String, f32)>>;
}

/// Keeps input order, assigning a strictly decreasing score so downstream
/// sort-by-rerank-score is stable and a no-op.
pub struct PassthroughReranker;

#[async_trait]
impl Reranker for PassthroughReranker {
    async fn rerank(&self, _query: &str, candidates: &[(String, String)]) -> Result<Vec<(String, f32)>> {
        Ok(candidates
            .iter()
            .enumerate()
            .map(|(i, (chunk_id, _))| (chunk_id.clone(), 1.0 - (i as f32 * 0.001)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_preserves_input_order() {
        let reranker = PassthroughReranker;
        let candidates = vec![
            ("a".to_string(), "content a".to_string()),
            ("b".to_string(), "content b".to_string()),
        ];
        let scores = reranker.rerank("query", &candidates).await.unwrap();
        assert_eq!(scores[0].0, "a");
        assert!(scores[0].1 > scores[1].1);
    }
}
