//! Generic keyed blob persistence for pipeline snapshots. `conflux-store` owns the `PipelineSnapshot` shape;
//! this module only owns *where* it lives and how it is addressed.

use crate::store::ConfluxStore;
use object_store::path::Path;

/// Snapshots are identified by `(user_id, agent_name, session_id)` per
/// , and overwritten in place.
pub fn snapshot_path(user_id: &str, agent_name: &str, session_id: &str) -> Path {
    Path::from(format!(
        "pipeline_snapshots/{}/{}/{}.json",
        urlencode(user_id),
        urlencode(agent_name),
        urlencode(session_id)
    ))
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_string()
            } else {
                format!("%{:02X}", c as u32)
            }
        })
        .collect()
}

pub struct SnapshotStore {
    store: ConfluxStore,
}

impl SnapshotStore {
    pub fn new(store: ConfluxStore) -> Self {
        Self { store }
    }

    pub async fn save<T: serde::Serialize>(
        &self,
        user_id: &str,
        agent_name: &str,
        session_id: &str,
        snapshot: &T,
    ) -> conflux_types::Result<()> {
        let path = snapshot_path(user_id, agent_name, session_id);
        self.store.put_json(&path, snapshot).await
    }

    pub async fn load<T: serde::de::DeserializeOwned>(
        &self,
        user_id: &str,
        agent_name: &str,
        session_id: &str,
    ) -> conflux_types::Result<Option<T>> {
        let path = snapshot_path(user_id, agent_name, session_id);
        self.store.get_json(&path).await
    }

    pub async fn delete(
        &self,
        user_id: &str,
        agent_name: &str,
        session_id: &str,
    ) -> conflux_types::Result<()> {
        let path = snapshot_path(user_id, agent_name, session_id);
        self.store.delete(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_stable_for_same_triple() {
        let p1 = snapshot_path("u1", "agent a", "s1");
        let p2 = snapshot_path("u1", "agent a", "s1");
        assert_eq!(p1, p2);
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let snap = SnapshotStore::new(ConfluxStore::in_memory());
        snap.save("u1", "a1", "s1", &serde_json::json!({"k": "v"}))
            .await
            .unwrap();
        let loaded: Option<serde_json::Value> = snap.load("u1", "a1", "s1").await.unwrap();
        assert_eq!(loaded, Some(serde_json::json!({"k": "v"})));
    }

    #[tokio::test]
    async fn load_missing_is_none_not_error() {
        let snap = SnapshotStore::new(ConfluxStore::in_memory());
        let loaded: Option<serde_json::Value> = snap.load("u9", "a9", "s9").await.unwrap();
        assert_eq!(loaded, None);
    }
}
