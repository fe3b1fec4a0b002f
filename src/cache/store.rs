use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::storage::BodyStore;

use super::error::Result;
use super::keys::{REGISTRY_PARTITION, decode_ns_key, encode_ns_key};

/// A stored response: status line, headers, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Convenience for locally generated responses with a single content type.
    pub fn with_content_type(status: u16, content_type: &str, body: Bytes) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body,
        }
    }
}

/// Per-entry metadata persisted in the namespace partition. The body itself
/// lives in the [`BodyStore`] under `body_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryRecord {
    status: u16,
    headers: Vec<(String, String)>,
    body_key: String,
    body_len: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    stored_at: DateTime<Utc>,
}

/// Namespaced persistent response cache.
///
/// Each namespace maps to one fjall partition holding entry metadata; a
/// registry partition records every namespace so enumeration is exact.
/// Writes are last-write-wins per key; there is no multi-key transaction.
#[derive(Clone)]
pub struct CacheStore {
    keyspace: Keyspace,
    registry: PartitionHandle,
    namespaces: Arc<RwLock<HashMap<String, PartitionHandle>>>,
    bodies: BodyStore,
}

impl CacheStore {
    /// Open or create a cache store at the given path.
    pub fn open<P: AsRef<Path>>(path: P, bodies: BodyStore) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening cache store");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let registry =
            keyspace.open_partition(REGISTRY_PARTITION, PartitionCreateOptions::default())?;

        let store = Self {
            keyspace,
            registry,
            namespaces: Arc::new(RwLock::new(HashMap::new())),
            bodies,
        };

        // Re-open every registered namespace so handles are warm
        for name in store.list_namespaces()? {
            store.partition(&name)?;
        }

        Ok(store)
    }

    /// Open (creating if needed) the partition backing `namespace` and
    /// record it in the registry.
    fn partition(&self, namespace: &str) -> Result<PartitionHandle> {
        if namespace == REGISTRY_PARTITION {
            return Err(super::error::CacheError::ReservedNamespace(
                namespace.to_string(),
            ));
        }
        if let Some(handle) = self.namespaces.read().unwrap().get(namespace) {
            return Ok(handle.clone());
        }

        let handle = self
            .keyspace
            .open_partition(namespace, PartitionCreateOptions::default())?;
        self.registry.insert(encode_ns_key(namespace), [])?;
        self.namespaces
            .write()
            .unwrap()
            .insert(namespace.to_string(), handle.clone());
        debug!(namespace, "Namespace opened");
        Ok(handle)
    }

    /// Store a response under the canonical request key. Replacing an
    /// existing entry removes the superseded body afterwards.
    pub async fn put(&self, namespace: &str, key: &str, response: CachedResponse) -> Result<()> {
        let partition = self.partition(namespace)?;

        let previous: Option<EntryRecord> = match partition.get(key.as_bytes())? {
            Some(bytes) => Some(serde_json::from_slice(&bytes)?),
            None => None,
        };

        let record = EntryRecord {
            status: response.status,
            headers: response.headers,
            body_key: Uuid::new_v4().to_string(),
            body_len: response.body.len() as u64,
            stored_at: Utc::now(),
        };

        // Body first, then metadata: a reader never sees a record whose
        // body is missing.
        self.bodies
            .put(namespace, &record.body_key, response.body)
            .await?;
        partition.insert(key.as_bytes(), serde_json::to_vec(&record)?)?;

        if let Some(old) = previous {
            self.bodies.delete(namespace, &old.body_key).await?;
        }

        debug!(namespace, key, size = record.body_len, "Cache entry stored");
        Ok(())
    }

    /// Look up a response by request key.
    pub async fn match_key(&self, namespace: &str, key: &str) -> Result<Option<CachedResponse>> {
        let partition = self.partition(namespace)?;
        let Some(bytes) = partition.get(key.as_bytes())? else {
            return Ok(None);
        };
        let record: EntryRecord = serde_json::from_slice(&bytes)?;
        let body = self.bodies.get(namespace, &record.body_key).await?;
        Ok(Some(CachedResponse {
            status: record.status,
            headers: record.headers,
            body,
        }))
    }

    /// All entry keys currently in the namespace, in key order. Callers that
    /// need bodies follow up with [`match_key`](Self::match_key); enumeration
    /// itself never touches the body store.
    pub fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        let partition = self.partition(namespace)?;
        let mut keys = Vec::new();
        for item in partition.iter() {
            let (key, _) = item?;
            if let Ok(key) = std::str::from_utf8(&key) {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }

    /// Delete one entry. Returns whether an entry existed.
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let partition = self.partition(namespace)?;
        let Some(bytes) = partition.get(key.as_bytes())? else {
            return Ok(false);
        };
        let record: EntryRecord = serde_json::from_slice(&bytes)?;
        partition.remove(key.as_bytes())?;
        self.bodies.delete(namespace, &record.body_key).await?;
        info!(namespace, key, "Cache entry deleted");
        Ok(true)
    }

    /// Every namespace ever opened, registry order.
    pub fn list_namespaces(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for item in self.registry.iter() {
            let (key, _) = item?;
            if let Some(name) = decode_ns_key(&key) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Drop a whole namespace: its bodies, its partition, and its registry
    /// entry. Unknown namespaces are a no-op.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        if self.registry.get(encode_ns_key(namespace))?.is_none() {
            return Ok(());
        }

        let partition = self.partition(namespace)?;
        for item in partition.iter() {
            let (_, value) = item?;
            let record: EntryRecord = serde_json::from_slice(&value)?;
            self.bodies.delete(namespace, &record.body_key).await?;
        }

        self.namespaces.write().unwrap().remove(namespace);
        self.keyspace.delete_partition(partition)?;
        self.registry.remove(encode_ns_key(namespace))?;
        info!(namespace, "Namespace deleted");
        Ok(())
    }

    /// Persist all pending writes to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}
