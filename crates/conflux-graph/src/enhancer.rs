//! [`conflux_kb::GraphEnhancer`] implementation: boosts chunks referenced by
//! entities mentioned in the query and appends a short triples context,
//! grounded on
//! the original implementation's
//! `enhance_rag_context`.

use crate::store::{extract_entities_from_query, GraphStore};
use async_trait::async_trait;
use conflux_kb::GraphEnhancer;
use conflux_types::ids::KnowledgeBaseId;
use conflux_types::model::Triple;
use std::collections::HashSet;

const MAX_QUERY_ENTITIES: usize = 5;
const MAX_TRIPLES_PER_ENTITY: usize = 5;
const MAX_CONTEXT_TRIPLES: usize = 10;

pub struct KnowledgeGraphEnhancer {
    store: std::sync::Arc<GraphStore>,
}

impl KnowledgeGraphEnhancer {
    pub fn new(store: std::sync::Arc<GraphStore>) -> Self {
        Self { store }
    }

    fn related_triples(&self, kb_id: &str, query: &str) -> Vec<Triple> {
        let kb_id = KnowledgeBaseId::new(kb_id);
        let entities = extract_entities_from_query(query);

        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        let mut triples = Vec::new();
        for entity in entities.iter().take(MAX_QUERY_ENTITIES) {
            for t in self.store.query_entities(&kb_id, entity, MAX_TRIPLES_PER_ENTITY) {
                let key = (t.subject.clone(), t.predicate.clone(), t.object.clone());
                if seen.insert(key) {
                    triples.push(t);
                }
            }
        }

        triples.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        triples.truncate(MAX_CONTEXT_TRIPLES);
        triples
    }
}

#[async_trait]
impl GraphEnhancer for KnowledgeGraphEnhancer {
    async fn referenced_chunks(&self, kb_id: &str, query: &str) -> Vec<String> {
        self.related_triples(kb_id, query)
            .into_iter()
            .filter_map(|t| t.chunk_id.map(|id| id.as_str().to_string()))
            .collect()
    }

    async fn triples_context(&self, kb_id: &str, query: &str) -> Option<String> {
        let triples = self.related_triples(kb_id, query);
        if triples.is_empty() {
            return None;
        }
        let mut context = String::from("相关实体关系：\n");
        for t in &triples {
            context.push_str(&format!("- {} {} {}\n", t.subject, t.predicate, t.object));
        }
        Some(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_types::ids::DocumentId;

    fn triple(s: &str, p: &str, o: &str, chunk: Option<&str>) -> Triple {
        Triple {
            knowledge_base_id: KnowledgeBaseId::new("kb1"),
            document_id: DocumentId::new("d1"),
            chunk_id: chunk.map(conflux_types::ids::ChunkId::new),
            subject: s.to_string(),
            predicate: p.to_string(),
            object: o.to_string(),
            confidence: 0.9,
            source_text: String::new(),
        }
    }

    #[tokio::test]
    async fn referenced_chunks_surfaces_entity_hits() {
        let store = std::sync::Arc::new(GraphStore::new());
        let kb = KnowledgeBaseId::new("kb1");
        store.insert_triples(
            &kb,
            vec![
                triple("刘备", "参与", "桃园结义", Some("c1")),
                triple("关羽", "参与", "桃园结义", Some("c1")),
            ],
        );
        let enhancer = KnowledgeGraphEnhancer::new(store);
        let chunks = enhancer.referenced_chunks("kb1", "\"刘备\"").await;
        assert_eq!(chunks, vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn triples_context_is_none_when_nothing_matches() {
        let store = std::sync::Arc::new(GraphStore::new());
        let enhancer = KnowledgeGraphEnhancer::new(store);
        assert!(enhancer.triples_context("kb1", "不存在的实体").await.is_none());
    }
}
