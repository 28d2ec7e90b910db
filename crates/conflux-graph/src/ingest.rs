//! The public entry point that turns a chunk of ingested text into stored
//! [`Triple`]s, composing the extraction-mode dispatch, the hybrid
//! rule/LLM supplement step, and the document analysis cache, grounded on
//! the original implementation's
//! `extract_entities_and_relations`.

use crate::analysis::DocumentAnalysisCache;
use crate::config::GraphConfig;
use crate::entities::EntityExtractor;
use crate::extract::{dispatch_non_llm, extract_with_llm, ExtractionMode, RawTriple};
use crate::rules::DynamicRule;
use crate::store::GraphStore;
use conflux_model::llm::LlmProvider;
use conflux_types::ids::{ChunkId, DocumentId, KnowledgeBaseId};
use conflux_types::model::Triple;

/// Extracts and stores triples for one chunk. `document_text`, when given,
/// is the full document used to seed the per-document analysis cache; omit it to analyze the
/// chunk text itself.
pub async fn ingest_chunk(
    store: &GraphStore,
    analysis_cache: &DocumentAnalysisCache,
    llm: &dyn LlmProvider,
    extractor: Option<&dyn EntityExtractor>,
    config: &GraphConfig,
    kb_id: &KnowledgeBaseId,
    document_id: &DocumentId,
    chunk_id: Option<&ChunkId>,
    text: &str,
) -> usize {
    if !config.enabled {
        return 0;
    }

    let dynamic_rules: Vec<DynamicRule> = if matches!(config.extract_mode, ExtractionMode::NerRule | ExtractionMode::Model) {
        analysis_cache
            .get_or_create(llm, document_id.clone(), text, config)
            .await
            .dynamic_rules
            .clone()
    } else {
        Vec::new()
    };

    let raw = extract_for_mode(config.extract_mode, text, llm, extractor, &dynamic_rules).await;
    let triples: Vec<Triple> = raw
        .into_iter()
        .map(|t| Triple {
            knowledge_base_id: kb_id.clone(),
            document_id: document_id.clone(),
            chunk_id: chunk_id.cloned(),
            subject: t.subject,
            predicate: t.predicate,
            object: t.object,
            confidence: t.confidence,
            source_text: text.chars().take(200).collect(),
        })
        .collect();

    store.insert_triples(kb_id, triples)
}

async fn extract_for_mode(
    mode: ExtractionMode,
    text: &str,
    llm: &dyn LlmProvider,
    extractor: Option<&dyn EntityExtractor>,
    dynamic_rules: &[DynamicRule],
) -> Vec<RawTriple> {
    match mode {
        ExtractionMode::Llm => extract_with_llm(llm, text).await,
        ExtractionMode::Hybrid => {
            let rule_triples = dispatch_non_llm(mode, text, extractor, dynamic_rules);
            if rule_triples.len() >= 2 {
                return rule_triples;
            }
            let llm_triples = extract_with_llm(llm, text).await;
            let mut seen: std::collections::HashSet<(String, String, String)> =
                rule_triples.iter().map(|t| (t.subject.clone(), t.predicate.clone(), t.object.clone())).collect();
            let mut merged = rule_triples;
            for t in llm_triples {
                let key = (t.subject.clone(), t.predicate.clone(), t.object.clone());
                if seen.insert(key) {
                    merged.push(t);
                }
            }
            merged
        }
        other => dispatch_non_llm(other, text, extractor, dynamic_rules),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_model::mock::MockLlmProvider;

    #[tokio::test]
    async fn ingest_chunk_stores_rule_mode_triples() {
        let store = GraphStore::new();
        let cache = DocumentAnalysisCache::new(1);
        let llm = MockLlmProvider::new();
        let config = GraphConfig {
            extract_mode: ExtractionMode::Rule,
            ..GraphConfig::default()
        };
        let kb = KnowledgeBaseId::new("kb1");
        let doc = DocumentId::new("doc1");
        let added = ingest_chunk(
            &store,
            &cache,
            &llm,
            None,
            &config,
            &kb,
            &doc,
            None,
            "刘备、关羽、张飞在桃园结义。",
        )
        .await;
        assert!(added > 0);
        assert!(store.query_event_participants(&kb, "桃园结义", 20).len() == 3);
    }

    #[tokio::test]
    async fn disabled_config_ingests_nothing() {
        let store = GraphStore::new();
        let cache = DocumentAnalysisCache::new(1);
        let llm = MockLlmProvider::new();
        let config = GraphConfig {
            enabled: false,
            ..GraphConfig::default()
        };
        let kb = KnowledgeBaseId::new("kb1");
        let doc = DocumentId::new("doc1");
        let added = ingest_chunk(&store, &cache, &llm, None, &config, &kb, &doc, None, "刘备是蜀汉的皇帝。").await;
        assert_eq!(added, 0);
    }
}
