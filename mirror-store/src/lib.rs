//! # mirror-store
//!
//! Snapshot storage for jobmirror.
//!
//! A snapshot is the last synced configuration of one CI job. Snapshots are
//! keyed by job name; stores derive their storage keys with
//! [`mirror_core::codec::encode`] and recover names with
//! [`mirror_core::codec::decode`].
//!
//! ## On-disk layout
//!
//! ```text
//! ~/jenkins_config/
//!   build-main.xml            job "build-main"
//!   folder%2Fdeploy.xml       job "folder/deploy"
//!   release%20notes.xml       job "release notes"
//! ```
//!
//! Each file holds the raw configuration payload, with no header.
//!
//! ## Example
//!
//! ```rust,ignore
//! use jobmirror_store::{FsSnapshotStore, SnapshotStore};
//!
//! let store = FsSnapshotStore::open("/var/lib/jobmirror").await?;
//! if !store.exists("folder/deploy").await? {
//!     store.write("folder/deploy", b"<project/>").await?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod fs;
mod store;

pub use error::StoreError;
pub use fs::FsSnapshotStore;
pub use store::{
    MemoryStore, NameStream, Snapshot, SnapshotStore, SnapshotStream, SNAPSHOT_EXTENSION,
};
