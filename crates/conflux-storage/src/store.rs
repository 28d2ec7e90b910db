//! A thin enum over `object_store` backends, mirroring
//! `FlowLikeStore` (packages/storage/src/files/store.rs): callers hold one
//! value regardless of whether blobs live in memory, on local disk, or in a
//! cloud bucket, and always reach the generic `ObjectStore` trait through
//! [`ConfluxStore::as_generic`].

use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;

#[derive(Clone)]
pub enum ConfluxStore {
    Memory(Arc<InMemory>),
    Local(Arc<LocalFileSystem>),
    Other(Arc<dyn ObjectStore>),
}

impl ConfluxStore {
    pub fn in_memory() -> Self {
        ConfluxStore::Memory(Arc::new(InMemory::new()))
    }

    pub fn local(root: impl AsRef<std::path::Path>) -> conflux_types::Result<Self> {
        let fs = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| conflux_types::Error::config(format!("local store root: {e}")))?;
        Ok(ConfluxStore::Local(Arc::new(fs)))
    }

    pub fn as_generic(&self) -> Arc<dyn ObjectStore> {
        match self {
            ConfluxStore::Memory(s) => s.clone() as Arc<dyn ObjectStore>,
            ConfluxStore::Local(s) => s.clone() as Arc<dyn ObjectStore>,
            ConfluxStore::Other(s) => s.clone(),
        }
    }

    pub async fn put_json<T: serde::Serialize>(
        &self,
        path: &Path,
        value: &T,
    ) -> conflux_types::Result<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| conflux_types::Error::data_shape(format!("serialize: {e}")))?;
        self.as_generic()
            .put(path, PutPayload::from(bytes))
            .await
            .map_err(|e| conflux_types::Error::dependency(format!("object store put: {e}")))?;
        Ok(())
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> conflux_types::Result<Option<T>> {
        let result = self.as_generic().get(path).await;
        let get_result = match result {
            Ok(r) => r,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => {
                return Err(conflux_types::Error::dependency(format!(
                    "object store get: {e}"
                )));
            }
        };
        let bytes = get_result
            .bytes()
            .await
            .map_err(|e| conflux_types::Error::dependency(format!("object store read: {e}")))?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| conflux_types::Error::consistency(format!("deserialize: {e}")))?;
        Ok(Some(value))
    }

    pub async fn delete(&self, path: &Path) -> conflux_types::Result<()> {
        match self.as_generic().delete(path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(conflux_types::Error::dependency(format!(
                "object store delete: {e}"
            ))),
        }
    }

    pub async fn list_prefix(&self, prefix: &Path) -> conflux_types::Result<Vec<Path>> {
        use futures::TryStreamExt;
        let paths: Vec<Path> = self
            .as_generic()
            .list(Some(prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await
            .map_err(|e| conflux_types::Error::dependency(format!("object store list: {e}")))?;
        Ok(paths)
    }
}

impl std::fmt::Debug for ConfluxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            ConfluxStore::Memory(_) => "memory",
            ConfluxStore::Local(_) => "local",
            ConfluxStore::Other(_) => "other",
        };
        write!(f, "ConfluxStore::{kind}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        a: i32,
        b: String,
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = ConfluxStore::in_memory();
        let path = Path::from("snapshots/demo.json");
        let value = Sample {
            a: 1,
            b: "hi".into(),
        };
        store.put_json(&path, &value).await.unwrap();
        let loaded: Option<Sample> = store.get_json(&path).await.unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = ConfluxStore::in_memory();
        let path = Path::from("snapshots/missing.json");
        let loaded: Option<Sample> = store.get_json(&path).await.unwrap();
        assert_eq!(loaded, None);
    }
}
