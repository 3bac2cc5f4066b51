//! # mirror-core
//!
//! Pure logic for jobmirror (no I/O, instant tests).
//!
//! ## Modules
//!
//! - [`codec`]: job name <-> snapshot identifier escaping
//! - [`diff`]: unified line diffs between snapshot and remote content
//! - [`event`]: events a reconciliation run emits, and the [`Reporter`] seam
//!
//! The actual I/O (HTTP, disk) is performed by `mirror-store` and
//! `mirror-client`, which build on these functions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod diff;
pub mod event;

pub use codec::{decode, encode, DecodeError};
pub use diff::unified_diff;
pub use event::{NullReporter, RecordingReporter, Reporter, SyncEvent, SyncSummary};
