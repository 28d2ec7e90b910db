//! Memory helpers layered on the 3-D store, grounded on
//! `write_to_memory`/`read_from_memory`/`search_memory`/`clear_memory` in
//! the original implementation.

use crate::dimensions::Context;
use crate::pipeline::{Pipeline, Target};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMatch {
    pub key: String,
    pub content: serde_json::Value,
    pub metadata: HashMap<String, serde_json::Value>,
}

fn metadata_key(key: &str) -> String {
    format!("{key}_metadata")
}

impl Pipeline {
    /// Writes `content` into the 3-D store under an auto-generated or
    /// caller-supplied key, stamping optional metadata with `created_at`.
    /// Returns the key actually used.
    pub fn write_to_memory(
        &mut self,
        content: serde_json::Value,
        key: Option<String>,
        metadata: Option<HashMap<String, serde_json::Value>>,
        user_id: Option<String>,
        topic_id: Option<String>,
        agent_id: Option<String>,
        context: Option<&Context>,
    ) -> String {
        let key = key.unwrap_or_else(|| format!("mem_{}", conflux_types::create_id()));
        self.put(
            &key,
            content,
            Target::three_d(user_id.clone(), topic_id.clone(), agent_id.clone(), context),
        );
        if let Some(mut metadata) = metadata {
            metadata.insert(
                "created_at".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
            self.put(
                &metadata_key(&key),
                serde_json::to_value(metadata).unwrap_or(serde_json::Value::Null),
                Target::three_d(user_id, topic_id, agent_id, context),
            );
        }
        key
    }

    pub fn read_from_memory(
        &self,
        key: &str,
        user_id: Option<String>,
        topic_id: Option<String>,
        agent_id: Option<String>,
        context: Option<&Context>,
    ) -> Option<serde_json::Value> {
        self.get(key, Target::three_d(user_id, topic_id, agent_id, context))
    }

    /// Plain substring match over string-valued memories in scope. Semantic
    /// search over memory is out of scope for now, left as a `# TODO` in
    /// the original implementation this is modeled on.
    pub fn search_memory(
        &self,
        query: &str,
        user_id: Option<String>,
        topic_id: Option<String>,
        agent_id: Option<String>,
        context: Option<&Context>,
        limit: Option<usize>,
    ) -> Vec<MemoryMatch> {
        use crate::dimensions::Dimensions;
        let dims = Dimensions::resolve(user_id, topic_id, agent_id, context);
        let data = self.get_3d_data(&dims);
        let query_lower = query.to_lowercase();
        let mut results = Vec::new();
        for (key, content) in &data {
            if key.ends_with("_metadata") {
                continue;
            }
            let matches = match content {
                serde_json::Value::String(s) => s.to_lowercase().contains(&query_lower),
                _ => false,
            };
            if matches {
                let metadata = data
                    .get(&metadata_key(key))
                    .and_then(|v| v.as_object())
                    .map(|m| m.clone().into_iter().collect())
                    .unwrap_or_default();
                results.push(MemoryMatch {
                    key: key.clone(),
                    content: content.clone(),
                    metadata,
                });
            }
        }
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        results
    }

    fn estimate_content_size(content: &serde_json::Value) -> usize {
        match content {
            serde_json::Value::String(s) => s.len(),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                serde_json::to_string(content).map(|s| s.len()).unwrap_or(0)
            }
            other => other.to_string().len(),
        }
    }

    pub fn estimate_memory_size(
        &self,
        user_id: Option<String>,
        topic_id: Option<String>,
        agent_id: Option<String>,
        context: Option<&Context>,
    ) -> usize {
        use crate::dimensions::Dimensions;
        let dims = Dimensions::resolve(user_id, topic_id, agent_id, context);
        self.get_3d_data(&dims)
            .iter()
            .filter(|(k, _)| !k.ends_with("_metadata"))
            .map(|(_, v)| Self::estimate_content_size(v))
            .sum()
    }

    /// Clears every memory in scope and returns the count of entries
    /// removed (metadata companion keys are not counted).
    pub fn clear_memory(
        &mut self,
        user_id: Option<String>,
        topic_id: Option<String>,
        agent_id: Option<String>,
        context: Option<&Context>,
    ) -> usize {
        use crate::dimensions::Dimensions;
        let dims = Dimensions::resolve(user_id, topic_id, agent_id, context);
        let data = self.get_3d_data(&dims);
        let count = data.keys().filter(|k| !k.ends_with("_metadata")).count();
        self.clear_3d_data(&dims);
        count
    }

    /// Convenience wrapper used by the agent layer to log a user turn.
    pub fn remember_user_message(&mut self, text: impl Into<String>, context: Option<&Context>) -> String {
        self.write_to_memory(
            serde_json::Value::String(text.into()),
            None,
            Some(HashMap::from([(
                "role".to_string(),
                serde_json::Value::String("user".to_string()),
            )])),
            None,
            None,
            None,
            context,
        )
    }

    pub fn remember_agent_response(&mut self, text: impl Into<String>, context: Option<&Context>) -> String {
        self.write_to_memory(
            serde_json::Value::String(text.into()),
            None,
            Some(HashMap::from([(
                "role".to_string(),
                serde_json::Value::String("assistant".to_string()),
            )])),
            None,
            None,
            None,
            context,
        )
    }

    pub fn remember_dialog_turn(
        &mut self,
        user_text: impl Into<String>,
        agent_text: impl Into<String>,
        context: Option<&Context>,
    ) -> (String, String) {
        let user_key = self.remember_user_message(user_text, context);
        let agent_key = self.remember_agent_response(agent_text, context);
        (user_key, agent_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;

    #[test]
    fn write_then_read_from_memory_roundtrips() {
        let mut pipeline = Pipeline::new("p1");
        let key = pipeline.write_to_memory(
            serde_json::json!("hello there"),
            None,
            None,
            Some("u1".into()),
            Some("t1".into()),
            Some("a1".into()),
            None,
        );
        assert_eq!(
            pipeline.read_from_memory(&key, Some("u1".into()), Some("t1".into()), Some("a1".into()), None),
            Some(serde_json::json!("hello there"))
        );
    }

    #[test]
    fn search_memory_matches_substring_case_insensitively() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.write_to_memory(
            serde_json::json!("The Quick Brown Fox"),
            None,
            None,
            Some("u1".into()),
            Some("t1".into()),
            Some("a1".into()),
            None,
        );
        let hits = pipeline.search_memory("quick brown", Some("u1".into()), Some("t1".into()), Some("a1".into()), None, None);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn clear_memory_excludes_metadata_from_count() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.write_to_memory(
            serde_json::json!("x"),
            Some("k1".into()),
            Some(HashMap::from([("tag".to_string(), serde_json::json!("note"))])),
            Some("u1".into()),
            Some("t1".into()),
            Some("a1".into()),
            None,
        );
        let cleared = pipeline.clear_memory(Some("u1".into()), Some("t1".into()), Some("a1".into()), None);
        assert_eq!(cleared, 1);
    }

    #[test]
    fn remember_dialog_turn_writes_both_roles() {
        let mut pipeline = Pipeline::new("p1");
        let (user_key, agent_key) = pipeline.remember_dialog_turn("hi", "hello!", None);
        assert_ne!(user_key, agent_key);
    }
}
