//! Export/import and durable persistence of a [`Pipeline`], grounded on
//! `export`/`export_for_frontend`/`import_data` in
//! the original implementation and persisted via
//! [`conflux_storage::SnapshotStore`].
//!
//! Unlike the Python, every value here is already a
//! `serde_json::Value`, so the try-serialize-or-stringify fallback the
//! original uses to cope with non-JSON objects (like its internal
//! `AgentContext`) has no counterpart to port: everything is serializable
//! by construction.

use crate::history::HistoryEntry;
use crate::pipeline::{FileEntry, Pipeline};
use conflux_storage::snapshot::SnapshotStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const AGENT_CONTEXTS_NAMESPACE: &str = "agent_contexts";
const FRONTEND_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExport {
    pub pipeline_id: String,
    pub data: HashMap<String, HashMap<String, serde_json::Value>>,
    pub data_3d: HashMap<String, HashMap<String, HashMap<String, HashMap<String, serde_json::Value>>>>,
    pub files: HashMap<String, FileEntry>,
    pub history_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendExport {
    pub pipeline_data: HashMap<String, HashMap<String, serde_json::Value>>,
    pub pipeline_data_3d: HashMap<String, HashMap<String, HashMap<String, HashMap<String, serde_json::Value>>>>,
    pub pipeline_files: HashMap<String, FileEntry>,
    pub pipeline_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineImport {
    #[serde(default)]
    pub data: Option<HashMap<String, HashMap<String, serde_json::Value>>>,
    #[serde(default)]
    pub data_3d: Option<HashMap<String, HashMap<String, HashMap<String, HashMap<String, serde_json::Value>>>>>,
    #[serde(default)]
    pub files: Option<HashMap<String, FileEntry>>,
}

impl Pipeline {
    pub fn export(&self) -> PipelineExport {
        PipelineExport {
            pipeline_id: self.pipeline_id.clone(),
            data: self
                .get_all_namespaces()
                .into_iter()
                .map(|ns| {
                    let bucket = self.get_namespace(&ns);
                    (ns, bucket)
                })
                .collect(),
            data_3d: self.export_data_3d(),
            files: self.export_files(),
            history_count: self.get_history(None).len(),
        }
    }

    pub fn export_for_frontend(&self) -> FrontendExport {
        let pipeline_data = self
            .get_all_namespaces()
            .into_iter()
            .filter(|ns| ns != AGENT_CONTEXTS_NAMESPACE)
            .map(|ns| {
                let bucket = self.get_namespace(&ns);
                (ns, bucket)
            })
            .collect();

        FrontendExport {
            pipeline_data,
            pipeline_data_3d: self.export_data_3d(),
            pipeline_files: self.export_files(),
            pipeline_history: self.get_history(Some(FRONTEND_HISTORY_LIMIT)),
        }
    }

    pub fn import_data(&mut self, import: PipelineImport) {
        if let Some(data) = import.data {
            self.replace_namespaces(data);
        }
        if let Some(data_3d) = import.data_3d {
            self.replace_3d_data(data_3d);
        }
        if let Some(files) = import.files {
            self.replace_files(files);
        }
    }
}

/// Persists/restores a pipeline's export under the `(user_id, agent_name,
/// session_id)` triple via [`conflux_storage::snapshot::SnapshotStore`].
pub async fn save_snapshot(
    store: &SnapshotStore,
    user_id: &str,
    agent_name: &str,
    session_id: &str,
    pipeline: &Pipeline,
) -> conflux_types::Result<()> {
    store.save(user_id, agent_name, session_id, &pipeline.export()).await
}

pub async fn load_snapshot(
    store: &SnapshotStore,
    user_id: &str,
    agent_name: &str,
    session_id: &str,
) -> conflux_types::Result<Option<PipelineExport>> {
    store.load(user_id, agent_name, session_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Target;

    #[test]
    fn export_then_import_roundtrips_namespaces_and_3d_data() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.put_text("greeting", "hi", "global");
        pipeline.put(
            "mood",
            serde_json::json!("curious"),
            Target::three_d(Some("u1".into()), Some("t1".into()), Some("a1".into()), None),
        );

        let exported = pipeline.export();
        let mut restored = Pipeline::new("p2");
        restored.import_data(PipelineImport {
            data: Some(exported.data.clone()),
            data_3d: Some(exported.data_3d.clone()),
            files: Some(exported.files.clone()),
        });

        assert_eq!(restored.get_text("greeting", "", "global"), "hi");
        assert_eq!(
            restored.get(
                "mood",
                Target::three_d(Some("u1".into()), Some("t1".into()), Some("a1".into()), None)
            ),
            Some(serde_json::json!("curious"))
        );
    }

    #[test]
    fn export_for_frontend_skips_agent_contexts_namespace() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.put_text("secret", "internal", AGENT_CONTEXTS_NAMESPACE);
        let frontend = pipeline.export_for_frontend();
        assert!(!frontend.pipeline_data.contains_key(AGENT_CONTEXTS_NAMESPACE));
    }

    #[tokio::test]
    async fn save_then_load_snapshot_roundtrips() {
        let store = SnapshotStore::new(conflux_storage::ConfluxStore::in_memory());
        let mut pipeline = Pipeline::new("p1");
        pipeline.put_text("greeting", "hi", "global");
        save_snapshot(&store, "u1", "agent1", "s1", &pipeline).await.unwrap();

        let loaded = load_snapshot(&store, "u1", "agent1", "s1").await.unwrap().unwrap();
        assert_eq!(loaded.pipeline_id, "p1");
    }

    #[tokio::test]
    async fn load_missing_snapshot_is_none() {
        let store = SnapshotStore::new(conflux_storage::ConfluxStore::in_memory());
        assert!(load_snapshot(&store, "nobody", "agent1", "s1").await.unwrap().is_none());
    }
}
