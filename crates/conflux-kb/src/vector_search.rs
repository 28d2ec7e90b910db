//! Vector recall route: brute-force cosine similarity
//! over a [`conflux_storage::VectorTable`] with the documented dynamic
//! threshold relaxation. this module's Open Question #1 resolution governs
//! how this interacts with reranking downstream.

use conflux_storage::VectorTable;

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub chunk_id: String,
    pub similarity: f32,
}

/// Applies `threshold`; if fewer than `top_k` candidates survive, relaxes
/// to `threshold_min`; if still short, takes the top `2 * top_k` regardless
/// of threshold.
pub fn vector_search(
    table: &VectorTable,
    query_embedding: &[f32],
    top_k: usize,
    threshold: f32,
    threshold_min: f32,
) -> Vec<VectorMatch> {
    let scored = table.search(query_embedding);

    let at_threshold: Vec<_> = scored.iter().filter(|(_, s)| *s >= threshold).collect();
    if at_threshold.len() >= top_k {
        return to_matches(at_threshold);
    }

    let at_floor: Vec<_> = scored.iter().filter(|(_, s)| *s >= threshold_min).collect();
    if at_floor.len() >= top_k {
        return to_matches(at_floor);
    }

    to_matches(scored.iter().take(2 * top_k).collect())
}

fn to_matches(rows: Vec<&(conflux_storage::VectorRow, f32)>) -> Vec<VectorMatch> {
    rows.into_iter()
        .map(|(row, score)| VectorMatch { chunk_id: row.id.clone(), similarity: *score })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_storage::VectorRow;

    fn table_with(rows: &[(&str, Vec<f32>)]) -> VectorTable {
        let table = VectorTable::new("kb1");
        for (id, embedding) in rows {
            table.upsert(VectorRow { id: id.to_string(), embedding: embedding.clone(), payload: serde_json::json!({}) });
        }
        table
    }

    #[test]
    fn enough_above_threshold_returns_only_those() {
        let table = table_with(&[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);
        let results = vector_search(&table, &[1.0, 0.0], 1, 0.5, 0.1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "a");
    }

    #[test]
    fn relaxes_to_floor_when_short() {
        let table = table_with(&[("a", vec![1.0, 0.0]), ("b", vec![0.7, 0.7])]);
        let results = vector_search(&table, &[1.0, 0.0], 2, 0.95, 0.3);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn falls_back_to_top_2k_when_floor_still_short() {
        let table = table_with(&[("a", vec![1.0, 0.0]), ("b", vec![-1.0, 0.0])]);
        let results = vector_search(&table, &[1.0, 0.0], 1, 0.99, 0.9);
        assert_eq!(results.len(), 2);
    }
}
