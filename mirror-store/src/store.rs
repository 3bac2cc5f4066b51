//! Snapshot storage.
//!
//! This module provides a trait for storing job configuration snapshots
//! keyed by job name, plus a memory-based implementation for testing.
//! Implementations derive every storage key through [`mirror_core::codec`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use mirror_core::codec;

use crate::error::StoreError;

/// File extension of every snapshot.
pub const SNAPSHOT_EXTENSION: &str = "xml";

/// A stored job configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Job name, decoded from the storage key.
    pub name: String,
    /// Raw configuration payload, verbatim. Never assumed to be UTF-8.
    pub content: Vec<u8>,
}

impl Snapshot {
    /// The snapshot identifier this job is stored under.
    pub fn id(&self) -> String {
        codec::encode(&self.name)
    }
}

/// Lazy enumeration of the snapshots in a store.
pub type SnapshotStream<'a> = BoxStream<'a, Result<Snapshot, StoreError>>;

/// Lazy enumeration of the job names in a store.
pub type NameStream<'a> = BoxStream<'a, Result<String, StoreError>>;

/// Trait for snapshot storage backends.
///
/// Writes and deletes are individually atomic; a run as a whole is not.
/// The store is assumed to have a single writer.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Check whether a snapshot exists for the job.
    async fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Read the stored configuration for the job.
    ///
    /// Returns `NotFound` if there is no snapshot.
    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or replace the snapshot for the job.
    ///
    /// No partially written snapshot is ever observable.
    async fn write(&self, name: &str, content: &[u8]) -> Result<(), StoreError>;

    /// Remove the snapshot for the job.
    ///
    /// Returns `NotFound` if there is no snapshot.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Enumerate the name of every snapshot currently in the store.
    ///
    /// Entries that are not snapshots of this store (wrong extension, names
    /// that fail to decode) are skipped. Contents are not read. Each call
    /// starts a fresh enumeration.
    fn list_names(&self) -> NameStream<'_>;

    /// Enumerate every snapshot currently in the store, with its content.
    ///
    /// Snapshots removed between listing and reading are skipped.
    fn list_all(&self) -> SnapshotStream<'_> {
        self.list_names()
            .filter_map(move |name| async move {
                let name = match name {
                    Ok(name) => name,
                    Err(e) => return Some(Err(e)),
                };
                match self.read(&name).await {
                    Ok(content) => Some(Ok(Snapshot { name, content })),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => Some(Err(e)),
                }
            })
            .boxed()
    }

    /// Unified diff from the stored configuration to `new_content`.
    ///
    /// Empty exactly when they are byte-identical. Returns `NotFound` if
    /// there is no snapshot.
    async fn diff_lines(&self, name: &str, new_content: &[u8]) -> Result<Vec<String>, StoreError> {
        let current = self.read(name).await?;
        Ok(mirror_core::unified_diff(name, current, new_content))
    }
}

/// In-memory snapshot store for testing.
///
/// Keys are snapshot identifiers, exactly as a filesystem store would name
/// its files. Counts writes and deletes, and can be told to fail them.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    entries: BTreeMap<String, Vec<u8>>,
    writes: usize,
    deletes: usize,
    fail_writes: HashMap<String, String>,
    fail_deletes: HashMap<String, String>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of entries currently stored.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().entries.is_empty()
    }

    /// Number of successful writes since creation.
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    /// Number of successful deletes since creation.
    pub fn deletes(&self) -> usize {
        self.inner.lock().unwrap().deletes
    }

    /// Insert an entry under a raw identifier, bypassing the codec.
    ///
    /// Simulates foreign files sitting in a snapshot directory.
    pub fn insert_raw(&self, id: &str, content: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .entries
            .insert(id.to_string(), content.to_vec());
    }

    /// Make every write for `name` fail with the given error.
    pub fn fail_writes_for(&self, name: &str, error: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_writes
            .insert(name.to_string(), error.to_string());
    }

    /// Make every delete for `name` fail with the given error.
    pub fn fail_deletes_for(&self, name: &str, error: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_deletes
            .insert(name.to_string(), error.to_string());
    }

    /// Current content of every decodable entry, keyed by job name.
    pub fn contents(&self) -> BTreeMap<String, Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter_map(|(id, content)| {
                codec::decode(id)
                    .ok()
                    .map(|name| (name, content.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let id = codec::encode(name);
        Ok(self.inner.lock().unwrap().entries.contains_key(&id))
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let id = codec::encode(name);
        self.inner
            .lock()
            .unwrap()
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    async fn write(&self, name: &str, content: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_writes.get(name) {
            return Err(StoreError::io(name, "write", std::io::Error::other(error.clone())));
        }
        inner.entries.insert(codec::encode(name), content.to_vec());
        inner.writes += 1;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_deletes.get(name) {
            return Err(StoreError::io(name, "delete", std::io::Error::other(error.clone())));
        }
        if inner.entries.remove(&codec::encode(name)).is_none() {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            });
        }
        inner.deletes += 1;
        Ok(())
    }

    fn list_names(&self) -> NameStream<'_> {
        let ids: Vec<String> = self.inner.lock().unwrap().entries.keys().cloned().collect();
        stream::iter(ids)
            .filter_map(|id| async move { codec::decode(&id).ok().map(Ok::<_, StoreError>) })
            .boxed()
    }
}
