//! Retrieval configuration, one field per environment variable
//! this crate reads. `conflux-server` parses the process environment once
//! at startup and threads this struct through; tests build it with
//! `RetrievalConfig::default()` plus field overrides.

use crate::chunking::ChunkStrategy;

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub chunk_strategy: ChunkStrategy,
    pub use_llm_merge: bool,
    pub reranker_enabled: bool,
    pub reranker_after_top_n: usize,
    pub reranker_top_k: usize,
    pub similarity_threshold: f32,
    pub similarity_threshold_min: f32,
    pub llm_query_decompose_enabled: bool,
    pub multi_route_recall_enabled: bool,
    pub domain_classify_enabled: bool,
    pub summary_chunks_enabled: bool,
    /// Weight applied to a decomposed sub-term's vector hits.
    pub sub_query_weight: f32,
    pub sub_query_worker_count: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_strategy: ChunkStrategy::default(),
            use_llm_merge: false,
            reranker_enabled: true,
            reranker_after_top_n: 20,
            reranker_top_k: 5,
            similarity_threshold: 0.75,
            similarity_threshold_min: 0.55,
            llm_query_decompose_enabled: true,
            multi_route_recall_enabled: true,
            domain_classify_enabled: true,
            summary_chunks_enabled: true,
            sub_query_weight: 0.9,
            sub_query_worker_count: 3,
        }
    }
}

impl RetrievalConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            chunk_strategy: std::env::var("CHUNK_STRATEGY")
                .ok()
                .and_then(|v| match v.to_lowercase().as_str() {
                    "hierarchical" => Some(ChunkStrategy::Hierarchical),
                    "semantic" => Some(ChunkStrategy::Semantic),
                    "sentence" => Some(ChunkStrategy::Sentence),
                    "fixed" => Some(ChunkStrategy::Fixed),
                    _ => None,
                })
                .unwrap_or(default.chunk_strategy),
            use_llm_merge: env_bool("USE_LLM_MERGE", default.use_llm_merge),
            reranker_enabled: env_bool("RERANKER_ENABLED", default.reranker_enabled),
            reranker_after_top_n: env_usize("RERANKER_AFTER_TOP_N", default.reranker_after_top_n),
            reranker_top_k: env_usize("RERANKER_TOP_K", default.reranker_top_k),
            similarity_threshold: env_f32("SIMILARITY_THRESHOLD", default.similarity_threshold),
            similarity_threshold_min: env_f32("SIMILARITY_THRESHOLD_MIN", default.similarity_threshold_min),
            llm_query_decompose_enabled: env_bool("LLM_QUERY_DECOMPOSE_ENABLED", default.llm_query_decompose_enabled),
            multi_route_recall_enabled: env_bool("MULTI_ROUTE_RECALL_ENABLED", default.multi_route_recall_enabled),
            domain_classify_enabled: env_bool("DOMAIN_CLASSIFY_ENABLED", default.domain_classify_enabled),
            summary_chunks_enabled: env_bool("SUMMARY_CHUNKS_ENABLED", default.summary_chunks_enabled),
            ..default
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
