//! The core Pipeline: namespace store + 3-D store + files + history,
//! grounded on the original implementation's `Pipeline` class.
//! Memory helpers, context-selection/compression, and knowledge extraction
//! live in sibling modules and operate through this type.

use crate::dimensions::{Context, Dimensions};
use crate::history::{History, HistoryEntry, HistoryScope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const GLOBAL_NAMESPACE: &str = "global";
pub const NODES_NAMESPACE: &str = "nodes";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub file_type: String,
    pub size: u64,
    pub metadata: HashMap<String, serde_json::Value>,
}

pub(crate) type NamespaceStore = HashMap<String, HashMap<String, serde_json::Value>>;
pub(crate) type ThreeDStore = HashMap<String, HashMap<String, HashMap<String, HashMap<String, serde_json::Value>>>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub pipeline_id: String,
    data: NamespaceStore,
    data_3d: ThreeDStore,
    files: HashMap<String, FileEntry>,
    history: History,
}

/// Where a `put`/`get`/`has`/`delete` call targets: the legacy flat
/// namespace store, or the persistent 3-D store.
pub enum Target<'a> {
    Namespace(&'a str),
    ThreeD {
        user_id: Option<String>,
        topic_id: Option<String>,
        agent_id: Option<String>,
        context: Option<&'a Context>,
    },
}

impl<'a> Target<'a> {
    pub fn namespace(ns: &'a str) -> Self {
        Target::Namespace(ns)
    }

    pub fn three_d(
        user_id: Option<String>,
        topic_id: Option<String>,
        agent_id: Option<String>,
        context: Option<&'a Context>,
    ) -> Self {
        Target::ThreeD {
            user_id,
            topic_id,
            agent_id,
            context,
        }
    }
}

impl Pipeline {
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        let mut data = NamespaceStore::new();
        data.insert(GLOBAL_NAMESPACE.to_string(), HashMap::new());
        data.insert(NODES_NAMESPACE.to_string(), HashMap::new());
        Self {
            pipeline_id: pipeline_id.into(),
            data,
            data_3d: ThreeDStore::new(),
            files: HashMap::new(),
            history: History::default(),
        }
    }

    pub fn generate(prefix: &str) -> Self {
        Self::new(format!("{prefix}_{}", conflux_types::create_id()))
    }

    // ---------- put / get / has / delete ----------

    pub fn put(&mut self, key: &str, value: serde_json::Value, target: Target<'_>) {
        match target {
            Target::Namespace(ns) => {
                let bucket = self.data.entry(ns.to_string()).or_default();
                let old = bucket.insert(key.to_string(), value.clone());
                self.history.push(HistoryEntry {
                    timestamp: conflux_types::now_millis(),
                    action: "put".into(),
                    scope: HistoryScope::Namespace { namespace: ns.to_string() },
                    key: key.to_string(),
                    old_value: old,
                    new_value: Some(value),
                });
            }
            Target::ThreeD { user_id, topic_id, agent_id, context } => {
                let dims = Dimensions::resolve(user_id, topic_id, agent_id, context);
                let old = self
                    .data_3d
                    .entry(dims.user_id.clone())
                    .or_default()
                    .entry(dims.topic_id.clone())
                    .or_default()
                    .entry(dims.agent_id.clone())
                    .or_default()
                    .insert(key.to_string(), value.clone());
                self.history.push(HistoryEntry {
                    timestamp: conflux_types::now_millis(),
                    action: "put".into(),
                    scope: HistoryScope::ThreeD {
                        user_id: dims.user_id,
                        topic_id: dims.topic_id,
                        agent_id: dims.agent_id,
                    },
                    key: key.to_string(),
                    old_value: old,
                    new_value: Some(value),
                });
            }
        }
    }

    pub fn get(&self, key: &str, target: Target<'_>) -> Option<serde_json::Value> {
        match target {
            Target::Namespace(ns) => self.data.get(ns).and_then(|b| b.get(key).cloned()),
            Target::ThreeD { user_id, topic_id, agent_id, context } => {
                let dims = Dimensions::resolve(user_id, topic_id, agent_id, context);
                self.data_3d
                    .get(&dims.user_id)
                    .and_then(|t| t.get(&dims.topic_id))
                    .and_then(|a| a.get(&dims.agent_id))
                    .and_then(|b| b.get(key).cloned())
            }
        }
    }

    pub fn has(&self, key: &str, target: Target<'_>) -> bool {
        self.get(key, target).is_some()
    }

    pub fn delete(&mut self, key: &str, target: Target<'_>) -> bool {
        match target {
            Target::Namespace(ns) => {
                if let Some(bucket) = self.data.get_mut(ns) {
                    if let Some(old) = bucket.remove(key) {
                        self.history.push(HistoryEntry {
                            timestamp: conflux_types::now_millis(),
                            action: "delete".into(),
                            scope: HistoryScope::Namespace { namespace: ns.to_string() },
                            key: key.to_string(),
                            old_value: Some(old),
                            new_value: None,
                        });
                        return true;
                    }
                }
                false
            }
            Target::ThreeD { user_id, topic_id, agent_id, context } => {
                let dims = Dimensions::resolve(user_id, topic_id, agent_id, context);
                let removed = self
                    .data_3d
                    .get_mut(&dims.user_id)
                    .and_then(|t| t.get_mut(&dims.topic_id))
                    .and_then(|a| a.get_mut(&dims.agent_id))
                    .and_then(|b| b.remove(key));
                if let Some(old) = removed {
                    self.history.push(HistoryEntry {
                        timestamp: conflux_types::now_millis(),
                        action: "delete".into(),
                        scope: HistoryScope::ThreeD {
                            user_id: dims.user_id,
                            topic_id: dims.topic_id,
                            agent_id: dims.agent_id,
                        },
                        key: key.to_string(),
                        old_value: Some(old),
                        new_value: None,
                    });
                    return true;
                }
                false
            }
        }
    }

    pub fn get_namespace(&self, namespace: &str) -> HashMap<String, serde_json::Value> {
        self.data.get(namespace).cloned().unwrap_or_default()
    }

    pub fn get_3d_data(&self, dims: &Dimensions) -> HashMap<String, serde_json::Value> {
        self.data_3d
            .get(&dims.user_id)
            .and_then(|t| t.get(&dims.topic_id))
            .and_then(|a| a.get(&dims.agent_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn clear_namespace(&mut self, namespace: &str) {
        self.data.insert(namespace.to_string(), HashMap::new());
    }

    pub fn clear_3d_data(&mut self, dims: &Dimensions) {
        if let Some(agent_map) = self
            .data_3d
            .get_mut(&dims.user_id)
            .and_then(|t| t.get_mut(&dims.topic_id))
        {
            agent_map.insert(dims.agent_id.clone(), HashMap::new());
        }
    }

    // ---------- node-scoped scratchpad ----------

    pub fn put_node(&mut self, node_id: &str, key: &str, value: serde_json::Value) {
        let compound = format!("{node_id}.{key}");
        self.put(&compound, value, Target::namespace(NODES_NAMESPACE));
    }

    pub fn get_node(&self, node_id: &str, key: &str) -> Option<serde_json::Value> {
        let compound = format!("{node_id}.{key}");
        self.get(&compound, Target::namespace(NODES_NAMESPACE))
    }

    pub fn get_node_data(&self, node_id: &str) -> HashMap<String, serde_json::Value> {
        let prefix = format!("{node_id}.");
        self.get_namespace(NODES_NAMESPACE)
            .into_iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|rest| (rest.to_string(), v)))
            .collect()
    }

    // ---------- files ----------

    pub fn put_file(&mut self, key: &str, path: impl Into<String>, file_type: impl Into<String>, size: u64) {
        self.files.insert(
            key.to_string(),
            FileEntry {
                path: path.into(),
                file_type: file_type.into(),
                size,
                metadata: HashMap::new(),
            },
        );
    }

    pub fn get_file(&self, key: &str) -> Option<&FileEntry> {
        self.files.get(key)
    }

    pub fn get_file_path(&self, key: &str) -> Option<&str> {
        self.files.get(key).map(|f| f.path.as_str())
    }

    pub fn list_files(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    // ---------- typed namespace convenience helpers ----------

    pub fn put_text(&mut self, key: &str, text: impl Into<String>, namespace: &str) {
        self.put(key, serde_json::Value::String(text.into()), Target::namespace(namespace));
    }

    pub fn get_text(&self, key: &str, default: &str, namespace: &str) -> String {
        self.get(key, Target::namespace(namespace))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    pub fn append_text(&mut self, key: &str, text: &str, separator: &str, namespace: &str) {
        let existing = self.get_text(key, "", namespace);
        let combined = if existing.is_empty() {
            text.to_string()
        } else {
            format!("{existing}{separator}{text}")
        };
        self.put_text(key, combined, namespace);
    }

    pub fn put_json(&mut self, key: &str, value: serde_json::Value, namespace: &str) {
        self.put(key, value, Target::namespace(namespace));
    }

    pub fn get_json(&self, key: &str, namespace: &str) -> serde_json::Value {
        self.get(key, Target::namespace(namespace))
            .unwrap_or(serde_json::Value::Object(Default::default()))
    }

    pub fn put_list(&mut self, key: &str, items: Vec<serde_json::Value>, namespace: &str) {
        self.put(key, serde_json::Value::Array(items), Target::namespace(namespace));
    }

    pub fn get_list(&self, key: &str, namespace: &str) -> Vec<serde_json::Value> {
        self.get(key, Target::namespace(namespace))
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
    }

    pub fn append_list(&mut self, key: &str, item: serde_json::Value, namespace: &str) {
        let mut list = self.get_list(key, namespace);
        list.push(item);
        self.put_list(key, list, namespace);
    }

    // ---------- history ----------

    pub fn get_history(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        self.history.recent(limit)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub(crate) fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    // ---------- introspection ----------

    pub fn list_users(&self) -> Vec<String> {
        self.data_3d.keys().cloned().collect()
    }

    pub fn list_topics(&self, user_id: Option<&str>) -> Vec<String> {
        match user_id {
            Some(uid) => self
                .data_3d
                .get(uid)
                .map(|t| t.keys().cloned().collect())
                .unwrap_or_default(),
            None => {
                let mut topics: Vec<String> = self
                    .data_3d
                    .values()
                    .flat_map(|t| t.keys().cloned())
                    .collect();
                topics.sort();
                topics.dedup();
                topics
            }
        }
    }

    pub fn list_agents(&self, user_id: Option<&str>, topic_id: Option<&str>) -> Vec<String> {
        let mut agents = Vec::new();
        let users: Vec<&String> = match user_id {
            Some(_) => self.data_3d.keys().filter(|u| Some(u.as_str()) == user_id).collect(),
            None => self.data_3d.keys().collect(),
        };
        for user in users {
            if let Some(topics) = self.data_3d.get(user) {
                let topic_keys: Vec<&String> = match topic_id {
                    Some(_) => topics.keys().filter(|t| Some(t.as_str()) == topic_id).collect(),
                    None => topics.keys().collect(),
                };
                for topic in topic_keys {
                    if let Some(agent_map) = topics.get(topic) {
                        agents.extend(agent_map.keys().cloned());
                    }
                }
            }
        }
        agents.sort();
        agents.dedup();
        agents
    }

    pub fn get_all_namespaces(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    // ---------- export/import plumbing (used by `crate::snapshot`) ----------

    pub(crate) fn export_data_3d(&self) -> ThreeDStore {
        self.data_3d.clone()
    }

    pub(crate) fn export_files(&self) -> HashMap<String, FileEntry> {
        self.files.clone()
    }

    pub(crate) fn replace_namespaces(&mut self, data: NamespaceStore) {
        self.data = data;
    }

    pub(crate) fn replace_3d_data(&mut self, data_3d: ThreeDStore) {
        self.data_3d = data_3d;
    }

    pub(crate) fn replace_files(&mut self, files: HashMap<String, FileEntry>) {
        self.files = files;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_put_get_roundtrips_and_logs_history() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.put("greeting", serde_json::json!("hi"), Target::namespace(GLOBAL_NAMESPACE));
        assert_eq!(
            pipeline.get("greeting", Target::namespace(GLOBAL_NAMESPACE)),
            Some(serde_json::json!("hi"))
        );
        assert_eq!(pipeline.get_history(None).len(), 1);
    }

    #[test]
    fn three_d_put_get_roundtrips_and_is_isolated_per_dimension() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.put(
            "name",
            serde_json::json!("Alice"),
            Target::three_d(Some("u1".into()), Some("t1".into()), Some("a1".into()), None),
        );
        assert_eq!(
            pipeline.get(
                "name",
                Target::three_d(Some("u1".into()), Some("t1".into()), Some("a1".into()), None)
            ),
            Some(serde_json::json!("Alice"))
        );
        assert_eq!(
            pipeline.get(
                "name",
                Target::three_d(Some("u2".into()), Some("t1".into()), Some("a1".into()), None)
            ),
            None
        );
    }

    #[test]
    fn delete_removes_key_and_reports_found() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.put("k", serde_json::json!(1), Target::namespace(GLOBAL_NAMESPACE));
        assert!(pipeline.delete("k", Target::namespace(GLOBAL_NAMESPACE)));
        assert!(!pipeline.delete("k", Target::namespace(GLOBAL_NAMESPACE)));
    }

    #[test]
    fn append_list_and_get_list_roundtrip() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.append_list("items", serde_json::json!(1), GLOBAL_NAMESPACE);
        pipeline.append_list("items", serde_json::json!(2), GLOBAL_NAMESPACE);
        assert_eq!(
            pipeline.get_list("items", GLOBAL_NAMESPACE),
            vec![serde_json::json!(1), serde_json::json!(2)]
        );
    }
}
