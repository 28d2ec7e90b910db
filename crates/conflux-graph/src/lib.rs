//! The C8 Knowledge Graph: rule/NER/LLM triple extraction with an optional
//! per-document dynamic-rule generation pass, a dedup-on-insert triple
//! store, and the multi-hop/shortest-path query surface,
//! grounded throughout on
//! the original implementation.
//!
//! [`enhancer::KnowledgeGraphEnhancer`] implements `conflux-kb`'s
//! [`conflux_kb::GraphEnhancer`] seam so the retrieval pipeline can boost
//! entity-referenced chunks without `conflux-kb` depending on this crate.

pub mod analysis;
pub mod config;
pub mod entities;
pub mod enhancer;
pub mod extract;
pub mod ingest;
pub mod rules;
pub mod store;

pub use analysis::{DocumentAnalysis, DocumentAnalysisCache, DocumentCache, GraphWorkerPool};
pub use config::GraphConfig;
pub use entities::{Entity, EntityExtractor, RuleEntityExtractor};
pub use enhancer::KnowledgeGraphEnhancer;
pub use extract::ExtractionMode;
pub use ingest::ingest_chunk;
pub use rules::{DynamicRule, SampleMethod};
pub use store::{EntityStatistics, GraphStore};
