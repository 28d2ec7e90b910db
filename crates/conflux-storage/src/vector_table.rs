//! A Lance-style vector table, following the pattern of LanceDB-backed
//! chunk table (`packages/storage` + `packages/core` historical Cargo.toml)
//! but without the Arrow/Lance dependency stack: rows live in memory behind
//! a `DashMap` and are persisted to the backing `ConfluxStore` as JSON, with
//! brute-force cosine similarity at query time: compute all
//! chunk-similarities, sort descending — just without a columnar engine
//! underneath it.

use crate::store::ConfluxStore;
use dashmap::DashMap;
use object_store::path::Path;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRow {
    pub id: String,
    pub embedding: Vec<f32>,
    pub payload: serde_json::Value,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// An in-memory, persistable vector table scoped to one table name (a
/// knowledge base id in practice).
#[derive(Clone)]
pub struct VectorTable {
    name: String,
    rows: Arc<DashMap<String, VectorRow>>,
}

impl VectorTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Arc::new(DashMap::new()),
        }
    }

    pub fn upsert(&self, row: VectorRow) {
        self.rows.insert(row.id.clone(), row);
    }

    pub fn remove(&self, id: &str) {
        self.rows.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<VectorRow> {
        self.rows.get(id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row scored against `query_embedding`, sorted by similarity
    /// descending.
    pub fn search(&self, query_embedding: &[f32]) -> Vec<(VectorRow, f32)> {
        let mut scored: Vec<(VectorRow, f32)> = self
            .rows
            .iter()
            .map(|entry| {
                let row = entry.value().clone();
                let score = cosine_similarity(&row.embedding, query_embedding);
                (row, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    fn snapshot_path(&self) -> Path {
        Path::from(format!("vector_tables/{}.json", self.name))
    }

    pub async fn persist(&self, store: &ConfluxStore) -> conflux_types::Result<()> {
        let rows: Vec<VectorRow> = self.rows.iter().map(|e| e.value().clone()).collect();
        store.put_json(&self.snapshot_path(), &rows).await
    }

    pub async fn load(name: impl Into<String>, store: &ConfluxStore) -> conflux_types::Result<Self> {
        let table = Self::new(name);
        if let Some(rows) = store
            .get_json::<Vec<VectorRow>>(&table.snapshot_path())
            .await?
        {
            for row in rows {
                table.rows.insert(row.id.clone(), row);
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_sorts_descending() {
        let table = VectorTable::new("kb1");
        table.upsert(VectorRow {
            id: "a".into(),
            embedding: vec![1.0, 0.0],
            payload: serde_json::json!({}),
        });
        table.upsert(VectorRow {
            id: "b".into(),
            embedding: vec![0.0, 1.0],
            payload: serde_json::json!({}),
        });
        let results = table.search(&[1.0, 0.0]);
        assert_eq!(results[0].0.id, "a");
        assert!(results[0].1 >= results[1].1);
    }

    #[tokio::test]
    async fn persist_then_load_roundtrips() {
        let store = ConfluxStore::in_memory();
        let table = VectorTable::new("kb1");
        table.upsert(VectorRow {
            id: "a".into(),
            embedding: vec![1.0, 2.0],
            payload: serde_json::json!({"x": 1}),
        });
        table.persist(&store).await.unwrap();
        let loaded = VectorTable::load("kb1", &store).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("a").unwrap().embedding, vec![1.0, 2.0]);
    }
}
