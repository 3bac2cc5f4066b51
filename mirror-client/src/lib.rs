//! # mirror-client
//!
//! Remote job source and reconciler for jobmirror.
//!
//! ## Features
//!
//! - **Remote abstraction**: [`RemoteSource`] with a Jenkins HTTP
//!   implementation and a scriptable mock
//! - **Reconciliation**: [`Reconciler`] creates, updates and deletes
//!   snapshots so the store mirrors the remote job set
//! - **Event stream**: progress is reported as [`SyncEvent`]s, never printed
//!
//! ## Example
//!
//! ```ignore
//! use jobmirror_client::{Credentials, JenkinsSource, Reconciler, DEFAULT_TIMEOUT};
//! use jobmirror_core::NullReporter;
//! use jobmirror_store::FsSnapshotStore;
//!
//! let remote = JenkinsSource::new(
//!     "https://ci.example.com/",
//!     Some(Credentials::new("alice", "secret")),
//!     DEFAULT_TIMEOUT,
//! )?;
//! let store = FsSnapshotStore::open("/home/alice/jenkins_config").await?;
//!
//! let summary = Reconciler::new(remote, store).run(&mut NullReporter).await?;
//! println!("{} changes", summary.changes());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod reconciler;
pub mod remote;

pub use mirror_core::{Reporter, SyncEvent, SyncSummary};
pub use reconciler::{ErrorPolicy, ReconcileError, Reconciler};
pub use remote::{
    Credentials, JenkinsSource, JobSummary, MockSource, RemoteError, RemoteSource, DEFAULT_TIMEOUT,
};
