//! Triple storage and the graph query surface, grounded on
//! the original implementation's
//! `store_triples`, `query_entities`, `query_event_participants`,
//! `query_relation_path`, `multi_hop_query`, `_extract_entities_from_query`,
//! and `get_entity_statistics`.

use conflux_types::ids::KnowledgeBaseId;
use conflux_types::model::Triple;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// One knowledge base's triple set, append-only aside from dedup-on-insert.
/// `Mutex<Vec<_>>` rather than a lock-free structure: writes only happen at
/// ingest time and are already serialized per  "KG extraction
/// uses a single process-global bounded worker pool", so contention is low.
pub struct GraphStore {
    kbs: DashMap<KnowledgeBaseId, Mutex<Vec<Triple>>>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self { kbs: DashMap::new() }
    }

    /// Inserts every triple not already present under `(kb_id, subject,
    /// predicate, object)`, returning how many were actually added.
    pub fn insert_triples(&self, kb_id: &KnowledgeBaseId, triples: Vec<Triple>) -> usize {
        if triples.is_empty() {
            return 0;
        }
        let bucket = self.kbs.entry(kb_id.clone()).or_insert_with(|| Mutex::new(Vec::new()));
        let mut stored = bucket.lock().expect("graph store mutex poisoned");
        let existing: HashSet<_> = stored.iter().map(Triple::dedup_key).collect();
        let mut added = 0;
        for triple in triples {
            if existing.contains(&triple.dedup_key()) {
                continue;
            }
            stored.push(triple);
            added += 1;
        }
        added
    }

    fn snapshot(&self, kb_id: &KnowledgeBaseId) -> Vec<Triple> {
        self.kbs
            .get(kb_id)
            .map(|bucket| bucket.lock().expect("graph store mutex poisoned").clone())
            .unwrap_or_default()
    }

    /// Exact match on subject or object, falling back to substring match for
    /// whatever's left of `limit`.
    pub fn query_entities(&self, kb_id: &KnowledgeBaseId, entity: &str, limit: usize) -> Vec<Triple> {
        let all = self.snapshot(kb_id);
        let mut exact: Vec<Triple> = all
            .iter()
            .filter(|t| t.subject == entity || t.object == entity)
            .take(limit)
            .cloned()
            .collect();

        if exact.len() < limit {
            let remaining = limit - exact.len();
            let fuzzy = all
                .iter()
                .filter(|t| (t.subject.contains(entity) || t.object.contains(entity)) && t.subject != entity && t.object != entity)
                .take(remaining)
                .cloned();
            exact.extend(fuzzy);
        }
        exact
    }

    /// `(participant, 参与, event_name)` triples, exact then substring on
    /// the event name.
    pub fn query_event_participants(&self, kb_id: &KnowledgeBaseId, event_name: &str, limit: usize) -> Vec<Triple> {
        let all = self.snapshot(kb_id);
        let exact: Vec<Triple> = all
            .iter()
            .filter(|t| t.predicate == "参与" && t.object == event_name)
            .take(limit)
            .cloned()
            .collect();
        if !exact.is_empty() {
            return exact;
        }
        all.iter()
            .filter(|t| t.predicate == "参与" && t.object.contains(event_name))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Bounded DFS between two entities, returning up to 5 paths sorted by
    /// `(len ascending, confidence sum descending)`.
    pub fn query_relation_path(&self, kb_id: &KnowledgeBaseId, start: &str, end: &str, max_hops: usize) -> Vec<Vec<Triple>> {
        let all = self.snapshot(kb_id);
        let mut by_entity: HashMap<&str, Vec<&Triple>> = HashMap::new();
        for t in &all {
            by_entity.entry(t.subject.as_str()).or_default().push(t);
            by_entity.entry(t.object.as_str()).or_default().push(t);
        }

        let mut paths = Vec::new();
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        dfs(start, end, max_hops, 0, &by_entity, &mut visited, &mut path, &mut paths);

        paths.sort_by(|a: &Vec<Triple>, b: &Vec<Triple>| {
            let a_conf: f32 = a.iter().map(|t| t.confidence).sum();
            let b_conf: f32 = b.iter().map(|t| t.confidence).sum();
            a.len().cmp(&b.len()).then(b_conf.partial_cmp(&a_conf).unwrap_or(std::cmp::Ordering::Equal))
        });
        paths.truncate(5);
        paths
    }

    /// Expands from the query's extracted entities up to `max_hops`,
    /// tagging each result triple with its hop distance (0 = touches a seed
    /// entity directly) and sorting by `(hop ascending, confidence
    /// descending)`, capped at 50.
    pub fn multi_hop_query(&self, kb_id: &KnowledgeBaseId, query: &str, max_hops: usize) -> Vec<(Triple, usize)> {
        let seeds = extract_entities_from_query(query);
        if seeds.is_empty() {
            return Vec::new();
        }

        let all = self.snapshot(kb_id);
        let mut visited: HashSet<String> = seeds.iter().cloned().collect();
        let mut current: HashSet<String> = seeds.into_iter().collect();
        let mut seen_triples: HashSet<(String, String, String)> = HashSet::new();
        let mut results: Vec<(Triple, usize)> = Vec::new();

        for hop in 0..=max_hops {
            if current.is_empty() {
                break;
            }
            let mut next = HashSet::new();
            let mut found_any = false;

            for entity in &current {
                for t in &all {
                    if !t.subject.contains(entity.as_str()) && !t.object.contains(entity.as_str()) {
                        continue;
                    }
                    let key = t.dedup_key();
                    let key = (key.1, key.2, key.0);
                    if seen_triples.contains(&key) {
                        continue;
                    }
                    seen_triples.insert(key);
                    found_any = true;
                    if !visited.contains(&t.subject) {
                        next.insert(t.subject.clone());
                    }
                    if !visited.contains(&t.object) {
                        next.insert(t.object.clone());
                    }
                    results.push((t.clone(), hop));
                }
            }

            visited.extend(next.iter().cloned());
            current = next;
            if !found_any {
                break;
            }
        }

        results.sort_by(|(a, ah), (b, bh)| ah.cmp(bh).then(b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal)));
        results.truncate(50);
        results
    }

    pub fn entity_statistics(&self, kb_id: &KnowledgeBaseId) -> EntityStatistics {
        let all = self.snapshot(kb_id);
        let subjects: HashSet<&str> = all.iter().map(|t| t.subject.as_str()).collect();
        let objects: HashSet<&str> = all.iter().map(|t| t.object.as_str()).collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for t in &all {
            *counts.entry(t.predicate.as_str()).or_default() += 1;
        }
        let mut top_relations: Vec<(String, usize)> = counts.into_iter().map(|(p, c)| (p.to_string(), c)).collect();
        top_relations.sort_by(|a, b| b.1.cmp(&a.1));
        top_relations.truncate(10);

        EntityStatistics {
            total_triples: all.len(),
            unique_subjects: subjects.len(),
            unique_objects: objects.len(),
            unique_entities: subjects.len() + objects.len(),
            top_relations,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityStatistics {
    pub total_triples: usize,
    pub unique_subjects: usize,
    pub unique_objects: usize,
    pub unique_entities: usize,
    pub top_relations: Vec<(String, usize)>,
}

#[allow(clippy::too_many_arguments)]
fn dfs<'a>(
    current: &'a str,
    target: &str,
    max_hops: usize,
    hops: usize,
    by_entity: &HashMap<&'a str, Vec<&'a Triple>>,
    visited: &mut HashSet<&'a str>,
    path: &mut Vec<Triple>,
    paths: &mut Vec<Vec<Triple>>,
) {
    if hops > max_hops || visited.contains(current) {
        return;
    }
    if current == target && !path.is_empty() {
        paths.push(path.clone());
        return;
    }

    visited.insert(current);

    if let Some(edges) = by_entity.get(current) {
        for triple in edges.iter().take(10) {
            let next = if triple.subject == current { triple.object.as_str() } else { triple.subject.as_str() };
            if visited.contains(next) {
                continue;
            }
            path.push((*triple).clone());
            dfs(next, target, max_hops, hops + 1, by_entity, visited, path, paths);
            path.pop();
        }
    }

    visited.remove(current);
}

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["“”]([^"“”]+)["“”]"#).unwrap());
static CAPITALIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*").unwrap());
static BOOK_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[《》]([^《》]+)[《》]").unwrap());
static CHINESE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[一-龥]{2,6}").unwrap());

/// Pulls candidate entity mentions out of a free-text query: quoted spans,
/// capitalized runs, book-title-bracket spans, and (since the source's
/// "sampled Chinese tokens" fallback has no further documented shape here)
/// 2-6 character Chinese runs when nothing else matched. Capped at 5.
pub fn extract_entities_from_query(query: &str) -> Vec<String> {
    let mut entities: HashSet<String> = HashSet::new();
    for m in QUOTED.captures_iter(query) {
        entities.insert(m[1].to_string());
    }
    for m in CAPITALIZED.find_iter(query) {
        entities.insert(m.as_str().to_string());
    }
    for m in BOOK_TITLE.captures_iter(query) {
        entities.insert(m[1].to_string());
    }
    if entities.is_empty() {
        for m in CHINESE_RUN.find_iter(query) {
            entities.insert(m.as_str().to_string());
        }
    }
    entities.into_iter().take(5).collect()
}

/// `"X的是谁"`-style queries ask who participated in an event
/// rather than a generic multi-hop expansion.
pub fn is_event_participant_query(query: &str) -> Option<String> {
    query.strip_suffix("的是谁").map(|prefix| prefix.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_types::ids::DocumentId;

    fn triple(kb: &str, s: &str, p: &str, o: &str, conf: f32) -> Triple {
        Triple {
            knowledge_base_id: KnowledgeBaseId::new(kb),
            document_id: DocumentId::new("d1"),
            chunk_id: None,
            subject: s.to_string(),
            predicate: p.to_string(),
            object: o.to_string(),
            confidence: conf,
            source_text: String::new(),
        }
    }

    #[test]
    fn insert_dedups_identical_triples() {
        let store = GraphStore::new();
        let kb = KnowledgeBaseId::new("kb1");
        let added1 = store.insert_triples(&kb, vec![triple("kb1", "刘备", "参与", "桃园结义", 0.9)]);
        let added2 = store.insert_triples(&kb, vec![triple("kb1", "刘备", "参与", "桃园结义", 0.9)]);
        assert_eq!(added1, 1);
        assert_eq!(added2, 0);
        assert_eq!(store.entity_statistics(&kb).total_triples, 1);
    }

    #[test]
    fn query_event_participants_finds_all_three() {
        let store = GraphStore::new();
        let kb = KnowledgeBaseId::new("kb1");
        store.insert_triples(
            &kb,
            vec![
                triple("kb1", "刘备", "参与", "桃园结义", 0.9),
                triple("kb1", "关羽", "参与", "桃园结义", 0.9),
                triple("kb1", "张飞", "参与", "桃园结义", 0.9),
            ],
        );
        let participants = store.query_event_participants(&kb, "桃园结义", 20);
        assert_eq!(participants.len(), 3);
    }

    #[test]
    fn multi_hop_with_zero_hops_returns_only_direct_triples() {
        let store = GraphStore::new();
        let kb = KnowledgeBaseId::new("kb1");
        store.insert_triples(
            &kb,
            vec![
                triple("kb1", "刘备", "参与", "桃园结义", 0.9),
                triple("kb1", "桃园结义", "发生地点", "桃园", 0.9),
            ],
        );
        let results = store.multi_hop_query(&kb, "\"刘备\"", 0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.subject, "刘备");
    }

    #[test]
    fn multi_hop_expands_across_hops() {
        let store = GraphStore::new();
        let kb = KnowledgeBaseId::new("kb1");
        store.insert_triples(
            &kb,
            vec![
                triple("kb1", "刘备", "参与", "桃园结义", 0.9),
                triple("kb1", "桃园结义", "发生地点", "桃园", 0.9),
            ],
        );
        let results = store.multi_hop_query(&kb, "\"刘备\"", 2);
        assert!(results.iter().any(|(t, _)| t.object == "桃园"));
    }

    #[test]
    fn event_participant_query_shape_is_detected() {
        assert_eq!(is_event_participant_query("桃园结义参与的是谁"), Some("桃园结义参与".to_string()));
        assert_eq!(is_event_participant_query("随便问问"), None);
    }

    #[test]
    fn relation_path_finds_direct_connection() {
        let store = GraphStore::new();
        let kb = KnowledgeBaseId::new("kb1");
        store.insert_triples(&kb, vec![triple("kb1", "刘备", "参与", "桃园结义", 0.9)]);
        let paths = store.query_relation_path(&kb, "刘备", "桃园结义", 3);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 1);
    }
}
