//! Body storage for cache entries.
//!
//! Entry metadata lives in the fjall keyspace; the (potentially very large)
//! response bodies are kept out of the LSM tree and stored here, behind the
//! object_store abstraction.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use object_store::{ObjectStore, path::Path as StoragePath};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BodyStoreError {
    #[error("body not found: {0}")]
    NotFound(String),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

pub type Result<T> = std::result::Result<T, BodyStoreError>;

/// Stores response bodies under `bodies/{namespace}/{body_key}`.
#[derive(Clone)]
pub struct BodyStore {
    store: Arc<dyn ObjectStore>,
}

impl BodyStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// In-memory backend for tests and development.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
        }
    }

    /// Filesystem backend rooted at `path` (created if missing).
    pub fn local<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::create_dir_all(path.as_ref()).map_err(|e| object_store::Error::Generic {
            store: "local",
            source: Box::new(e),
        })?;
        let fs = object_store::local::LocalFileSystem::new_with_prefix(path.as_ref())?;
        Ok(Self {
            store: Arc::new(fs),
        })
    }

    fn location(namespace: &str, body_key: &str) -> StoragePath {
        StoragePath::from(format!("bodies/{}/{}", namespace, body_key))
    }

    pub async fn put(&self, namespace: &str, body_key: &str, body: Bytes) -> Result<()> {
        let path = Self::location(namespace, body_key);
        let size = body.len();
        self.store.put(&path, body.into()).await?;
        tracing::debug!(namespace, body_key, size, "Body stored");
        Ok(())
    }

    pub async fn get(&self, namespace: &str, body_key: &str) -> Result<Bytes> {
        let path = Self::location(namespace, body_key);
        match self.store.get(&path).await {
            Ok(result) => Ok(result.bytes().await?),
            Err(object_store::Error::NotFound { .. }) => {
                Err(BodyStoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Removing a body that is already gone is not an error.
    pub async fn delete(&self, namespace: &str, body_key: &str) -> Result<()> {
        let path = Self::location(namespace, body_key);
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip() {
        let store = BodyStore::in_memory();
        store
            .put("media", "abc", Bytes::from_static(b"movie bytes"))
            .await
            .unwrap();

        let body = store.get("media", "abc").await.unwrap();
        assert_eq!(&body[..], b"movie bytes");
    }

    #[tokio::test]
    async fn missing_body_is_not_found() {
        let store = BodyStore::in_memory();
        let err = store.get("media", "nope").await.unwrap_err();
        assert!(matches!(err, BodyStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = BodyStore::in_memory();
        store
            .put("static-v1", "k", Bytes::from_static(b"x"))
            .await
            .unwrap();

        store.delete("static-v1", "k").await.unwrap();
        // Second delete of the same body is a no-op
        store.delete("static-v1", "k").await.unwrap();
        assert!(store.get("static-v1", "k").await.is_err());
    }
}
