//! Embedding provider seam, following the pattern of
//! `packages/model-provider/src/embedding` module — kept to the two
//! operations `conflux-kb` actually calls: batch document embedding and
//! single query embedding.

use async_trait::async_trait;
use conflux_types::Result;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch
            .pop()
            .ok_or_else(|| conflux_types::Error::dependency("embedding provider returned no vector"))
    }
}
