//! Context management: priority-tagged writes, selection, compression,
//! summarization, and namespace isolation. Grounded on
//! `write_context`/`select_context`/`compress_context`/`summarize_context`/
//! `create_isolated_context`/`switch_context`/`merge_context` in
//! the original implementation.
//!
//! Several of the original methods are placeholders pending an embedding
//! model (`select_relevant`, the `summarize` compression strategy); those
//! stay placeholders here too, since ranking/generation depend on
//! `conflux_model::{EmbeddingProvider, LlmProvider}` implementations that
//! are out of scope. `select_relevant` and `summarize_context`
//! below accept those providers so callers can wire them in once available.

use crate::pipeline::{Pipeline, Target, GLOBAL_NAMESPACE};
use conflux_model::embedding::EmbeddingProvider;
use conflux_model::llm::{CompletionRequest, LlmProvider};
use conflux_model::history::HistoryMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    Append,
    Replace,
    Merge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub key: String,
    pub content: serde_json::Value,
    pub priority: i64,
    pub metadata: HashMap<String, serde_json::Value>,
    pub namespace: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Priority,
    Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompressionReport {
    pub original_size: usize,
    pub compressed_size: usize,
    pub removed_keys: Vec<String>,
    pub strategy: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStrategy {
    RemoveLowPriority,
    MergeSimilar,
    Summarize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Merge,
    Replace,
    Append,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergeReport {
    pub source_namespace: String,
    pub target_namespace: String,
    pub merged_count: usize,
    pub replaced_count: usize,
}

fn is_companion_key(key: &str) -> bool {
    key.ends_with("_priority") || key.ends_with("_metadata") || key.ends_with("_max_size")
}

impl Pipeline {
    pub fn write_context(
        &mut self,
        content: serde_json::Value,
        key: Option<String>,
        namespace: &str,
        priority: i64,
        max_size: Option<usize>,
        strategy: WriteStrategy,
    ) -> String {
        let key = key.unwrap_or_else(|| format!("ctx_{}", conflux_types::create_id()));
        match (strategy, &content) {
            (WriteStrategy::Append, serde_json::Value::String(s)) => {
                self.append_text(&key, s, "\n", namespace);
            }
            (WriteStrategy::Merge, serde_json::Value::Object(incoming)) => {
                let mut existing = self.get_json(&key, namespace);
                let existing_map = existing.as_object_mut().expect("get_json always returns an object");
                for (k, v) in incoming {
                    existing_map.insert(k.clone(), v.clone());
                }
                self.put_json(&key, existing, namespace);
            }
            (WriteStrategy::Merge, serde_json::Value::Array(incoming)) => {
                let mut existing = self.get_list(&key, namespace);
                existing.extend(incoming.clone());
                self.put_list(&key, existing, namespace);
            }
            _ => {
                self.put(&key, content, Target::namespace(namespace));
            }
        }
        self.put(&format!("{key}_priority"), serde_json::json!(priority), Target::namespace(namespace));
        if let Some(max_size) = max_size {
            self.put(&format!("{key}_max_size"), serde_json::json!(max_size), Target::namespace(namespace));
        }
        key
    }

    pub fn write_context_with_metadata(
        &mut self,
        content: serde_json::Value,
        metadata: HashMap<String, serde_json::Value>,
        key: Option<String>,
        namespace: &str,
    ) -> String {
        let key = key.unwrap_or_else(|| format!("ctx_{}", conflux_types::create_id()));
        self.put(&key, content, Target::namespace(namespace));
        self.put(
            &format!("{key}_metadata"),
            serde_json::to_value(metadata).unwrap_or(serde_json::Value::Null),
            Target::namespace(namespace),
        );
        key
    }

    pub fn select_context(
        &self,
        namespace: &str,
        limit: Option<usize>,
        min_priority: Option<i64>,
        tags: Option<&[String]>,
        sort_by: SortBy,
    ) -> Vec<ContextItem> {
        let namespace_data = self.get_namespace(namespace);
        let mut selected = Vec::new();

        for (key, content) in &namespace_data {
            if is_companion_key(key) {
                continue;
            }
            let priority = namespace_data
                .get(&format!("{key}_priority"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let metadata: HashMap<String, serde_json::Value> = namespace_data
                .get(&format!("{key}_metadata"))
                .and_then(|v| v.as_object())
                .map(|m| m.clone().into_iter().collect())
                .unwrap_or_default();

            if let Some(min_priority) = min_priority {
                if priority < min_priority {
                    continue;
                }
            }
            if let Some(tags) = tags {
                let item_tags: Vec<String> = metadata
                    .get("tags")
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                if !tags.iter().any(|t| item_tags.contains(t)) {
                    continue;
                }
            }

            selected.push(ContextItem {
                key: key.clone(),
                content: content.clone(),
                priority,
                metadata,
                namespace: namespace.to_string(),
            });
        }

        match sort_by {
            SortBy::Priority => selected.sort_by(|a, b| b.priority.cmp(&a.priority)),
            SortBy::Timestamp => selected.sort_by(|a, b| {
                let ts = |item: &ContextItem| {
                    item.metadata
                        .get("timestamp")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string()
                };
                ts(b).cmp(&ts(a))
            }),
        }

        if let Some(limit) = limit {
            selected.truncate(limit);
        }
        selected
    }

    /// Embedding-ranked selection. Unlike the placeholder (which
    /// returns an empty list until an embedding model is wired in), this
    /// actually ranks using any `EmbeddingProvider`.
    pub async fn select_relevant(
        &self,
        query: &str,
        namespace: &str,
        embeddings: &dyn EmbeddingProvider,
        top_k: usize,
        threshold: f32,
    ) -> conflux_types::Result<Vec<(ContextItem, f32)>> {
        let namespace_data = self.get_namespace(namespace);
        let mut candidates = Vec::new();
        for (key, content) in &namespace_data {
            if is_companion_key(key) {
                continue;
            }
            if let serde_json::Value::String(text) = content {
                candidates.push((key.clone(), text.clone()));
            }
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = embeddings.embed_query(query).await?;
        let texts: Vec<String> = candidates.iter().map(|(_, t)| t.clone()).collect();
        let doc_vecs = embeddings.embed_batch(&texts).await?;

        let mut scored: Vec<(ContextItem, f32)> = candidates
            .into_iter()
            .zip(doc_vecs)
            .map(|((key, content), vec)| {
                let score = conflux_storage::cosine_similarity(&query_vec, &vec);
                let item = ContextItem {
                    key: key.clone(),
                    content: serde_json::Value::String(content),
                    priority: 0,
                    metadata: HashMap::new(),
                    namespace: namespace.to_string(),
                };
                (item, score)
            })
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    pub fn compress_context(&mut self, namespace: &str, strategy: CompressionStrategy) -> CompressionReport {
        let original_size = self.get_namespace(namespace).len();

        if strategy == CompressionStrategy::RemoveLowPriority {
            let namespace_data = self.get_namespace(namespace);
            let mut removed_keys = Vec::new();
            for key in namespace_data.keys() {
                if is_companion_key(key) {
                    continue;
                }
                let priority = namespace_data
                    .get(&format!("{key}_priority"))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                if priority <= 0 {
                    self.delete(key, Target::namespace(namespace));
                    removed_keys.push(key.clone());
                }
            }
            let compressed_size = self.get_namespace(namespace).len();
            return CompressionReport {
                original_size,
                compressed_size,
                removed_keys,
                strategy: "remove_low_priority".to_string(),
            };
        }

        CompressionReport {
            original_size,
            compressed_size: original_size,
            removed_keys: Vec::new(),
            strategy: match strategy {
                CompressionStrategy::MergeSimilar => "merge_similar".to_string(),
                CompressionStrategy::Summarize => "summarize".to_string(),
                CompressionStrategy::RemoveLowPriority => unreachable!(),
            },
        }
    }

    pub fn summarize_context_text(&self, keys: Option<&[String]>, namespace: &str, max_length: Option<usize>) -> String {
        let namespace_data = self.get_namespace(namespace);
        let owned_keys: Vec<String> = match keys {
            Some(keys) => keys.to_vec(),
            None => namespace_data
                .keys()
                .filter(|k| !k.ends_with("_priority") && !k.ends_with("_metadata"))
                .cloned()
                .collect(),
        };

        let contents: Vec<String> = owned_keys
            .iter()
            .filter_map(|key| self.get(key, Target::namespace(namespace)))
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => serde_json::to_string(&v).ok(),
                _ => None,
            })
            .collect();

        let mut summary = contents.join("\n\n");
        if let Some(max_length) = max_length {
            if summary.len() > max_length {
                summary.truncate(max_length);
                summary.push_str("...");
            }
        }
        summary
    }

    /// LLM-backed summarization, used once a real `LlmProvider` is wired
    /// in; falls back to the plain join above when no content is present.
    pub async fn summarize_context(
        &self,
        keys: Option<&[String]>,
        namespace: &str,
        max_length: Option<usize>,
        llm: &dyn LlmProvider,
    ) -> conflux_types::Result<String> {
        let joined = self.summarize_context_text(keys, namespace, None);
        if joined.is_empty() {
            return Ok(String::new());
        }
        let prompt = format!(
            "Summarize the following context concisely{}:\n\n{joined}",
            max_length.map(|n| format!(" in under {n} characters")).unwrap_or_default()
        );
        let request = CompletionRequest::new(vec![HistoryMessage::user(prompt)]);
        llm.complete(request).await
    }

    pub fn create_isolated_context(&mut self, context_id: &str, parent_namespace: Option<&str>) -> String {
        let namespace = format!("isolated_{context_id}");
        if self.get_all_namespaces().iter().all(|n| n != &namespace) {
            self.clear_namespace(&namespace);
        }
        if let Some(parent_namespace) = parent_namespace {
            let parent_data = self.get_namespace(parent_namespace);
            for (key, value) in parent_data {
                self.put(&key, value, Target::namespace(&namespace));
            }
        }
        namespace
    }

    pub fn switch_context(&mut self, context_id: &str, namespace: &str) -> String {
        let isolated = format!("isolated_{context_id}");
        if self.get_all_namespaces().iter().any(|n| n == &isolated) {
            return isolated;
        }
        self.create_isolated_context(context_id, Some(namespace))
    }

    pub fn merge_context(&mut self, source_namespace: &str, target_namespace: &str, strategy: MergeStrategy) -> MergeReport {
        let source_data = self.get_namespace(source_namespace);
        let target_data = self.get_namespace(target_namespace);

        let mut merged_count = 0usize;
        let mut replaced_count = 0usize;

        for (key, value) in &source_data {
            if is_companion_key(key) {
                continue;
            }
            match strategy {
                MergeStrategy::Replace => {
                    self.put(key, value.clone(), Target::namespace(target_namespace));
                    replaced_count += 1;
                }
                MergeStrategy::Merge => {
                    let existing = target_data.get(key);
                    let merged = match (value, existing) {
                        (serde_json::Value::Object(incoming), Some(serde_json::Value::Object(existing))) => {
                            let mut merged = existing.clone();
                            for (k, v) in incoming {
                                merged.insert(k.clone(), v.clone());
                            }
                            serde_json::Value::Object(merged)
                        }
                        (serde_json::Value::Array(incoming), Some(serde_json::Value::Array(existing))) => {
                            let mut merged = existing.clone();
                            merged.extend(incoming.clone());
                            serde_json::Value::Array(merged)
                        }
                        _ => value.clone(),
                    };
                    self.put(key, merged, Target::namespace(target_namespace));
                    merged_count += 1;
                }
                MergeStrategy::Append => {
                    let new_key = format!("{source_namespace}_{key}");
                    self.put(&new_key, value.clone(), Target::namespace(target_namespace));
                    merged_count += 1;
                }
            }
        }

        MergeReport {
            source_namespace: source_namespace.to_string(),
            target_namespace: target_namespace.to_string(),
            merged_count,
            replaced_count,
        }
    }

    pub fn list_isolated_contexts(&self) -> Vec<String> {
        self.get_all_namespaces()
            .into_iter()
            .filter(|n| n.starts_with("isolated_"))
            .collect()
    }

    pub fn delete_isolated_context(&mut self, context_id: &str) -> bool {
        let namespace = format!("isolated_{context_id}");
        if self.get_all_namespaces().iter().any(|n| n == &namespace) {
            self.clear_namespace(&namespace);
            true
        } else {
            false
        }
    }
}

pub fn default_namespace() -> &'static str {
    GLOBAL_NAMESPACE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;

    #[test]
    fn write_context_append_joins_with_newline() {
        let mut pipeline = Pipeline::new("p1");
        let key = pipeline.write_context(
            serde_json::json!("first"),
            Some("k".into()),
            GLOBAL_NAMESPACE,
            0,
            None,
            WriteStrategy::Append,
        );
        pipeline.write_context(serde_json::json!("second"), Some(key.clone()), GLOBAL_NAMESPACE, 0, None, WriteStrategy::Append);
        assert_eq!(pipeline.get_text(&key, "", GLOBAL_NAMESPACE), "first\nsecond");
    }

    #[test]
    fn select_context_filters_by_min_priority_and_sorts_descending() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.write_context(serde_json::json!("low"), Some("a".into()), GLOBAL_NAMESPACE, 1, None, WriteStrategy::Replace);
        pipeline.write_context(serde_json::json!("high"), Some("b".into()), GLOBAL_NAMESPACE, 5, None, WriteStrategy::Replace);
        let selected = pipeline.select_context(GLOBAL_NAMESPACE, None, Some(2), None, SortBy::Priority);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].key, "b");
    }

    #[test]
    fn compress_context_remove_low_priority_drops_zero_priority_entries() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.write_context(serde_json::json!("keep"), Some("a".into()), GLOBAL_NAMESPACE, 3, None, WriteStrategy::Replace);
        pipeline.write_context(serde_json::json!("drop"), Some("b".into()), GLOBAL_NAMESPACE, 0, None, WriteStrategy::Replace);
        let report = pipeline.compress_context(GLOBAL_NAMESPACE, CompressionStrategy::RemoveLowPriority);
        assert_eq!(report.removed_keys, vec!["b".to_string()]);
    }

    #[test]
    fn isolated_context_inherits_parent_data_by_value() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.put_text("shared", "value", GLOBAL_NAMESPACE);
        let isolated = pipeline.create_isolated_context("scratch", Some(GLOBAL_NAMESPACE));
        assert_eq!(pipeline.get_text("shared", "", &isolated), "value");
        pipeline.put_text("shared", "changed", &isolated);
        assert_eq!(pipeline.get_text("shared", "", GLOBAL_NAMESPACE), "value");
    }

    #[test]
    fn list_isolated_contexts_only_returns_isolated_namespaces() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.create_isolated_context("a", None);
        let isolated = pipeline.list_isolated_contexts();
        assert_eq!(isolated, vec!["isolated_a".to_string()]);
    }
}
