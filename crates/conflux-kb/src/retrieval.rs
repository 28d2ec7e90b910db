//! The query-time orchestration: preprocess,
//! optionally decompose, recall across vector/keyword/sub-query routes in
//! parallel, merge into a hybrid score, optionally graph-enhance and
//! rerank, then synthesize a final answer — grounded end to end on
//! the original implementation's
//! `query_knowledge_base`.

use crate::config::RetrievalConfig;
use crate::decompose;
use crate::keyword_index::KeywordIndex;
use crate::rerank::Reranker;
use crate::vector_search::{self, VectorMatch};
use async_trait::async_trait;
use conflux_model::embedding::EmbeddingProvider;
use conflux_model::history::HistoryMessage;
use conflux_model::llm::{CompletionRequest, LlmProvider};
use conflux_types::ids::KnowledgeBaseId;
use conflux_types::model::{Chunk, KbDocument};
use conflux_types::Result;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One knowledge base's recall indexes plus the chunk/document bodies they
/// point into. Owned by whatever process wires `conflux-kb` into the rest
/// of the runtime (`conflux-server` in practice).
pub struct KbIndex {
    pub kb_id: KnowledgeBaseId,
    pub vectors: conflux_storage::VectorTable,
    pub keywords: KeywordIndex,
    pub chunks: DashMap<String, Chunk>,
    pub documents: DashMap<String, KbDocument>,
}

impl KbIndex {
    pub fn new(kb_id: KnowledgeBaseId) -> Self {
        let vectors = conflux_storage::VectorTable::new(kb_id.as_str().to_string());
        Self {
            kb_id,
            vectors,
            keywords: KeywordIndex::new(),
            chunks: DashMap::new(),
            documents: DashMap::new(),
        }
    }

    /// Indexes one chunk into both recall routes and stores its body for
    /// retrieval-time lookup.
    pub fn add_chunk(&self, chunk: Chunk) {
        self.keywords.index_chunk(chunk.id.as_str(), &chunk.content);
        self.vectors.upsert(conflux_storage::VectorRow {
            id: chunk.id.as_str().to_string(),
            embedding: chunk.embedding.clone(),
            payload: serde_json::json!({"document_id": chunk.document_id.as_str()}),
        });
        self.chunks.insert(chunk.id.as_str().to_string(), chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Optional graph-boost seam. A trait rather than a
/// hard dependency on `conflux-graph`, the same decoupling `conflux-agents`'
/// `KnowledgeQuerier` uses to avoid depending on `conflux-kb`.
#[async_trait]
pub trait GraphEnhancer: Send + Sync {
    /// Chunk ids the graph store considers relevant to entities mentioned
    /// in `query`, eligible for the similarity boost.
    async fn referenced_chunks(&self, kb_id: &str, query: &str) -> Vec<String>;

    /// A short textual listing of related triples to append to the answer
    /// context, if any.
    async fn triples_context(&self, _kb_id: &str, _query: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub similarity: f32,
    pub rerank_score: Option<f32>,
    pub source: String,
    pub graph_boosted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub query: String,
    pub response: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Default)]
struct MergedHit {
    vector: Option<f32>,
    keyword: Option<f32>,
    keyword_matches: usize,
}

#[derive(Debug, Clone)]
struct Candidate {
    chunk_id: String,
    similarity: f32,
    source: &'static str,
    rerank_score: Option<f32>,
}

/// Squashes an unbounded positional keyword score into `[0, 1)` so it's
/// comparable to cosine similarity.
fn normalize_keyword_score(raw: f32) -> f32 {
    raw / (1.0 + raw)
}

/// Vector weight 1.0, keyword weight 0.8 boosted to 1.2x within the keyword
/// route for >= 2 matched terms, then merged: a
/// keyword hit strong enough to dominate (> 0.8 and above the vector score)
/// replaces the vector hit outright; one merely comparable (> 70% of the
/// vector score) produces a 0.6/0.4 fused hybrid score; otherwise the
/// vector score wins as-is.
fn fuse(hit: &MergedHit) -> (f32, &'static str) {
    let weighted_kw = hit.keyword.map(|k| {
        let normalized = normalize_keyword_score(k);
        let boosted = if hit.keyword_matches >= 2 { normalized * 1.2 } else { normalized };
        (boosted * 0.8).min(1.0)
    });
    match (hit.vector, weighted_kw) {
        (Some(v), Some(k)) if k > 0.8 && k > v => (k, "keyword"),
        (Some(v), Some(k)) if k > 0.7 * v => ((0.6 * v + 0.4 * k).min(1.0), "hybrid"),
        (Some(v), Some(_)) => (v, "vector"),
        (Some(v), None) => (v, "vector"),
        (None, Some(k)) => (k, "keyword"),
        (None, None) => (0.0, "none"),
    }
}

/// The full query pipeline. `max_results` bounds the number of sources in
/// the final answer; internal recall casts a wider net before merge/rerank
/// narrow it back down.
#[allow(clippy::too_many_arguments)]
pub async fn query(
    index: &KbIndex,
    embedder: &dyn EmbeddingProvider,
    llm: &dyn LlmProvider,
    reranker: Option<&dyn Reranker>,
    graph: Option<&dyn GraphEnhancer>,
    query_text: &str,
    max_results: usize,
    config: &RetrievalConfig,
) -> Result<RetrievalResult> {
    if index.is_empty() {
        return Ok(RetrievalResult {
            query: query_text.to_string(),
            response: "I don't have any relevant documents to answer that yet.".to_string(),
            sources: Vec::new(),
        });
    }

    // Step 1: preprocessing. Typo-correction/rewriting are external
    // collaborators per ; this stage is just normalization.
    let processed_query = query_text.trim().to_string();

    // Step 2: optional query decomposition.
    let sub_terms = decompose::decompose_query(llm, &processed_query, config.llm_query_decompose_enabled).await;

    // Step 3: multi-route recall.
    let top_k = max_results.max(1);
    let query_embedding = embedder.embed_query(&processed_query).await?;

    let vector_hits = vector_search::vector_search(
        &index.vectors,
        &query_embedding,
        top_k,
        config.similarity_threshold,
        config.similarity_threshold_min,
    );
    let keyword_hits = index.keywords.search(&processed_query, top_k * 2);

    let sub_hits: Vec<Vec<VectorMatch>> = if config.multi_route_recall_enabled && !sub_terms.is_empty() {
        let futures = sub_terms.iter().map(|term| async {
            match embedder.embed_query(term).await {
                Ok(embedding) => vector_search::vector_search(
                    &index.vectors,
                    &embedding,
                    top_k,
                    config.similarity_threshold,
                    config.similarity_threshold_min,
                ),
                Err(_) => Vec::new(),
            }
        });
        futures::future::join_all(futures).await
    } else {
        Vec::new()
    };

    // Step 4: merge by chunk_id into a fused score.
    let mut merged: HashMap<String, MergedHit> = HashMap::new();
    for hit in vector_hits {
        merged.entry(hit.chunk_id).or_default().vector = Some(hit.similarity);
    }
    for hit in keyword_hits {
        let entry = merged.entry(hit.chunk_id).or_default();
        entry.keyword = Some(hit.score);
        entry.keyword_matches = hit.matched_terms;
    }
    for sub_result in sub_hits {
        for hit in sub_result {
            let weighted = hit.similarity * config.sub_query_weight;
            let entry = merged.entry(hit.chunk_id).or_default();
            entry.vector = Some(entry.vector.map_or(weighted, |existing| existing.max(weighted)));
        }
    }

    let mut candidates: Vec<Candidate> = merged
        .into_iter()
        .map(|(chunk_id, hit)| {
            let (similarity, source) = fuse(&hit);
            Candidate { chunk_id, similarity, source, rerank_score: None }
        })
        .collect();

    // Step 5: optional graph enhancement.
    let mut graph_boosted: HashSet<String> = HashSet::new();
    if let Some(graph) = graph {
        let referenced: HashSet<String> = graph.referenced_chunks(index.kb_id.as_str(), &processed_query).await.into_iter().collect();
        for candidate in candidates.iter_mut() {
            if referenced.contains(&candidate.chunk_id) {
                candidate.similarity = (candidate.similarity + 0.1).min(1.0);
                graph_boosted.insert(candidate.chunk_id.clone());
            }
        }
    }

    candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    // Step 6: rerank the top candidates.
    let candidate_n = config.reranker_after_top_n.max(2 * max_results).min(candidates.len());
    candidates.truncate(candidate_n);

    if config.reranker_enabled {
        if let Some(reranker) = reranker {
            let pairs: Vec<(String, String)> = candidates
                .iter()
                .filter_map(|c| index.chunks.get(&c.chunk_id).map(|chunk| (c.chunk_id.clone(), chunk.content.clone())))
                .collect();
            if let Ok(scores) = reranker.rerank(&processed_query, &pairs).await {
                let score_map: HashMap<String, f32> = scores.into_iter().collect();
                for candidate in candidates.iter_mut() {
                    candidate.rerank_score = score_map.get(&candidate.chunk_id).copied();
                }
            }
        }
        candidates.sort_by(|a, b| {
            b.rerank_score.unwrap_or(b.similarity).total_cmp(&a.rerank_score.unwrap_or(a.similarity))
        });
        candidates.truncate(config.reranker_top_k.max(max_results).min(candidates.len()));
    }
    candidates.truncate(max_results.min(candidates.len()));

    // Step 7: synthesize the final answer from the surviving context.
    let mut context_text = String::new();
    for candidate in &candidates {
        if let Some(chunk) = index.chunks.get(&candidate.chunk_id) {
            if !context_text.is_empty() {
                context_text.push_str("\n\n");
            }
            context_text.push_str(&chunk.content);
        }
    }
    if let Some(graph) = graph {
        if let Some(triples) = graph.triples_context(index.kb_id.as_str(), &processed_query).await {
            context_text.push_str("\n\nRelated facts:\n");
            context_text.push_str(&triples);
        }
    }

    let response = match generate_answer(llm, &processed_query, &context_text).await {
        Ok(answer) => answer,
        Err(_) => context_text.chars().take(2000).collect(),
    };

    let sources = candidates
        .into_iter()
        .filter_map(|c| {
            index.chunks.get(&c.chunk_id).map(|chunk| Source {
                chunk_id: c.chunk_id.clone(),
                document_id: chunk.document_id.as_str().to_string(),
                content: chunk.content.clone(),
                similarity: c.similarity,
                rerank_score: c.rerank_score,
                source: c.source.to_string(),
                graph_boosted: graph_boosted.contains(&c.chunk_id),
            })
        })
        .collect();

    Ok(RetrievalResult { query: processed_query, response, sources })
}

async fn generate_answer(llm: &dyn LlmProvider, query: &str, context: &str) -> Result<String> {
    if context.trim().is_empty() {
        return Ok("I couldn't find anything relevant to answer that.".to_string());
    }
    let request = CompletionRequest::new(vec![
        HistoryMessage::system(
            "Answer the user's question using only the provided context. If the context is \
             insufficient, say so plainly rather than guessing.",
        ),
        HistoryMessage::user(format!("Context:\n{context}\n\nQuestion: {query}")),
    ]);
    llm.complete(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_model::mock::{MockEmbeddingProvider, MockLlmProvider};
    use conflux_types::ids::{ChunkId, DocumentId};

    fn sample_chunk(id: &str, doc: &str, content: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: ChunkId::new(id),
            document_id: DocumentId::new(doc),
            knowledge_base_id: KnowledgeBaseId::new("kb1"),
            chunk_index: 0,
            content: content.to_string(),
            embedding,
            chunk_metadata: Default::default(),
            chunk_strategy: "fixed".to_string(),
            strategy_variant: None,
            domain: None,
            domain_confidence: None,
            is_summary: false,
            summary_parent_chunk_id: None,
        }
    }

    #[tokio::test]
    async fn empty_index_returns_a_graceful_fallback() {
        let index = KbIndex::new(KnowledgeBaseId::new("kb1"));
        let embedder = MockEmbeddingProvider::new(8);
        let llm = MockLlmProvider::new();
        let config = RetrievalConfig { llm_query_decompose_enabled: false, ..Default::default() };
        let result = query(&index, &embedder, &llm, None, None, "anything", 3, &config).await.unwrap();
        assert!(result.sources.is_empty());
        assert!(!result.response.is_empty());
    }

    #[tokio::test]
    async fn a_matching_chunk_is_returned_as_a_source() {
        let index = KbIndex::new(KnowledgeBaseId::new("kb1"));
        let embedder = MockEmbeddingProvider::new(8);
        let emb = embedder.embed_query("rust systems programming").await.unwrap();
        index.add_chunk(sample_chunk("c1", "d1", "rust systems programming guide", emb));
        let unrelated_emb = embedder.embed_query("baking sourdough bread").await.unwrap();
        index.add_chunk(sample_chunk("c2", "d1", "baking sourdough bread recipe", unrelated_emb));

        let llm = MockLlmProvider::with_response("Rust is a systems programming language.");
        let config = RetrievalConfig {
            llm_query_decompose_enabled: false,
            multi_route_recall_enabled: false,
            reranker_enabled: false,
            similarity_threshold: 0.9,
            similarity_threshold_min: 0.1,
            ..Default::default()
        };
        let result = query(&index, &embedder, &llm, None, None, "rust systems programming", 1, &config)
            .await
            .unwrap();
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].chunk_id, "c1");
    }

    #[tokio::test]
    async fn graph_enhancer_boosts_referenced_chunks() {
        struct AlwaysBoost;
        #[async_trait]
        impl GraphEnhancer for AlwaysBoost {
            async fn referenced_chunks(&self, _kb_id: &str, _query: &str) -> Vec<String> {
                vec!["c2".to_string()]
            }
        }

        let index = KbIndex::new(KnowledgeBaseId::new("kb1"));
        let embedder = MockEmbeddingProvider::new(8);
        let emb_a = embedder.embed_query("alpha content here").await.unwrap();
        let emb_b = embedder.embed_query("beta content here").await.unwrap();
        index.add_chunk(sample_chunk("c1", "d1", "alpha content here", emb_a));
        index.add_chunk(sample_chunk("c2", "d1", "beta content here", emb_b));

        let llm = MockLlmProvider::with_response("answer");
        let config = RetrievalConfig {
            llm_query_decompose_enabled: false,
            multi_route_recall_enabled: false,
            reranker_enabled: false,
            similarity_threshold: 2.0,
            similarity_threshold_min: 2.0,
            ..Default::default()
        };
        let result = query(&index, &embedder, &llm, None, Some(&AlwaysBoost), "alpha content here", 2, &config)
            .await
            .unwrap();
        let boosted = result.sources.iter().find(|s| s.chunk_id == "c2").unwrap();
        assert!(boosted.graph_boosted);
    }
}
