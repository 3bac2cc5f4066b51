//! Filesystem snapshot store.
//!
//! Layout: one file per job directly under the root directory, named
//! `<encoded job name>.xml`, holding the configuration bytes verbatim.
//! Writes go to a short, randomly named hidden file (`.XXXXXX.tmp`) first
//! and are renamed into place, so any legal snapshot name can be written.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use mirror_core::codec;
use tokio::fs;

use crate::error::StoreError;
use crate::store::{NameStream, SnapshotStore, SNAPSHOT_EXTENSION};

/// Snapshot store backed by a directory.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

/// Progress of a directory enumeration.
enum Listing {
    Pending(PathBuf),
    Open(PathBuf, fs::ReadDir),
    Finished,
}

impl FsSnapshotStore {
    /// Open a store rooted at `root`, creating the directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns `NotADirectory` if `root` exists but is not a directory, or
    /// `Root` if it cannot be inspected or created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StoreError::NotADirectory { path: root }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&root)
                    .await
                    .map_err(|source| StoreError::Root {
                        path: root.clone(),
                        source,
                    })?;
                tracing::info!("Created snapshot directory {}", root.display());
            }
            Err(source) => return Err(StoreError::Root { path: root, source }),
        }
        Ok(Self { root })
    }

    /// The directory snapshots live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot file for a job.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", codec::encode(name), SNAPSHOT_EXTENSION))
    }
}

/// Write `content` to a temporary file in `dir`, then rename it to `target`.
///
/// The temporary file is removed when any step fails.
fn persist_atomically(dir: &Path, target: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(content)?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Job name for a directory entry, if the entry is one of our snapshots.
fn snapshot_name(file_name: &str) -> Option<String> {
    let id = file_name.strip_suffix(SNAPSHOT_EXTENSION)?.strip_suffix('.')?;
    match codec::decode(id) {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::debug!("Skipping {}: {}", file_name, e);
            None
        }
    }
}

async fn entry_name(root: &Path, entry: &fs::DirEntry) -> Result<Option<String>, StoreError> {
    let file_name = entry.file_name();
    let Some(file_name) = file_name.to_str() else {
        tracing::debug!("Skipping non-UTF-8 entry {:?}", entry.file_name());
        return Ok(None);
    };
    let Some(name) = snapshot_name(file_name) else {
        return Ok(None);
    };

    match entry.file_type().await {
        Ok(file_type) if file_type.is_file() => Ok(Some(name)),
        Ok(_) => {
            tracing::debug!("Skipping {}: not a regular file", root.join(file_name).display());
            Ok(None)
        }
        // Removed since the directory was read
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::io(&name, "inspect", source)),
    }
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        match fs::metadata(self.path_for(name)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::io(name, "inspect", source)),
        }
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        fs::read(self.path_for(name))
            .await
            .map_err(|e| StoreError::from_io(name, "read", e))
    }

    async fn write(&self, name: &str, content: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(name);
        let (root, target, bytes) = (self.root.clone(), path.clone(), content.to_vec());

        tokio::task::spawn_blocking(move || persist_atomically(&root, &target, &bytes))
            .await
            .map_err(|e| StoreError::io(name, "write", std::io::Error::other(e)))?
            .map_err(|source| StoreError::io(name, "write", source))?;

        tracing::debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name);
        fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::from_io(name, "delete", e))?;
        tracing::debug!("Removed {}", path.display());
        Ok(())
    }

    fn list_names(&self) -> NameStream<'_> {
        stream::unfold(Listing::Pending(self.root.clone()), |listing| async move {
            let (root, mut dir) = match listing {
                Listing::Pending(root) => match fs::read_dir(&root).await {
                    Ok(dir) => (root, dir),
                    Err(source) => {
                        return Some((Err(StoreError::Root { path: root, source }), Listing::Finished))
                    }
                },
                Listing::Open(root, dir) => (root, dir),
                Listing::Finished => return None,
            };

            loop {
                let entry = match dir.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => return None,
                    Err(source) => {
                        return Some((Err(StoreError::Root { path: root, source }), Listing::Finished))
                    }
                };
                match entry_name(&root, &entry).await {
                    Ok(Some(name)) => return Some((Ok(name), Listing::Open(root, dir))),
                    Ok(None) => continue,
                    Err(e) => return Some((Err(e), Listing::Finished)),
                }
            }
        })
        .boxed()
    }
}
