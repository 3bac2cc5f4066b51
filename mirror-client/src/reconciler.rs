//! Reconciler - brings a snapshot store in line with a remote source.
//!
//! # Architecture
//!
//! ```text
//! RemoteSource ──list/get──► Reconciler ──exists/diff/write/delete──► SnapshotStore
//!                                │
//!                                └──SyncEvent──► Reporter
//! ```
//!
//! A run has three strictly ordered phases:
//!
//! 1. **Discovery & apply**: for each listed job, in the remote's order,
//!    fetch its configuration. Jobs that vanished since the listing are
//!    skipped and not marked seen. New jobs are written, changed jobs are
//!    overwritten, unchanged jobs are left alone.
//! 2. **Deletion sweep**: every stored snapshot whose job was not seen in
//!    phase 1 is deleted.
//! 3. **Completion**: a `Done` event carries the run's counters.
//!
//! Running twice against an unchanged remote performs no writes the second
//! time.

use std::collections::HashSet;

use futures_util::StreamExt;
use mirror_core::{Reporter, SyncEvent, SyncSummary};
use mirror_store::{SnapshotStore, StoreError};
use thiserror::Error;

use crate::remote::{RemoteError, RemoteSource};

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The remote job list could not be obtained. Nothing was changed.
    #[error("cannot list remote jobs: {0}")]
    Remote(#[source] RemoteError),

    /// A job's configuration could not be fetched.
    #[error("failed to fetch configuration for job '{name}': {source}")]
    Fetch {
        /// Job name.
        name: String,
        /// Underlying remote error.
        #[source]
        source: RemoteError,
    },

    /// A snapshot could not be read, written, listed or deleted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What to do when a single job cannot be fetched or stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Abort the run on the first error. Earlier writes are kept.
    #[default]
    FailFast,
    /// Report the job as failed, keep its snapshot, and carry on.
    ///
    /// Errors no job can avoid (rejected credentials, bad URL) still abort.
    Continue,
}

/// Outcome of processing one listed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Vanished,
    Discovered,
    Updated,
    Unchanged,
}

/// Drives one reconciliation run at a time.
pub struct Reconciler<R: RemoteSource, S: SnapshotStore> {
    remote: R,
    store: S,
    policy: ErrorPolicy,
}

impl<R: RemoteSource, S: SnapshotStore> Reconciler<R, S> {
    /// Create a fail-fast reconciler.
    pub fn new(remote: R, store: S) -> Self {
        Self {
            remote,
            store,
            policy: ErrorPolicy::default(),
        }
    }

    /// Set the per-job error policy.
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get the remote source (for testing).
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Get the snapshot store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one full reconciliation pass.
    ///
    /// # Errors
    ///
    /// Fails without touching the store if the remote cannot be listed.
    /// Under [`ErrorPolicy::FailFast`] the first job error aborts the run;
    /// snapshots already written or deleted stay that way.
    pub async fn run(&self, reporter: &mut dyn Reporter) -> Result<SyncSummary, ReconcileError> {
        let jobs = self.remote.list_jobs().await.map_err(ReconcileError::Remote)?;
        tracing::info!("Reconciling {} remote jobs", jobs.len());

        let mut summary = SyncSummary::default();
        let mut seen: HashSet<String> = HashSet::with_capacity(jobs.len());

        for job in jobs {
            reporter.report(&SyncEvent::Processing {
                name: job.name.clone(),
            });

            match self.apply(&job.name, reporter).await {
                Ok(JobOutcome::Vanished) => {
                    tracing::debug!("Job '{}' vanished before its config was fetched", job.name);
                    summary.vanished += 1;
                    continue;
                }
                Ok(JobOutcome::Discovered) => summary.discovered += 1,
                Ok(JobOutcome::Updated) => summary.updated += 1,
                Ok(JobOutcome::Unchanged) => summary.unchanged += 1,
                Err(e) if self.tolerates(&e) => {
                    tracing::warn!("Skipping job '{}': {}", job.name, e);
                    reporter.report(&SyncEvent::Failed {
                        name: job.name.clone(),
                        message: e.to_string(),
                    });
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
            seen.insert(job.name);
        }

        summary.deleted = self.sweep(&seen, reporter).await?;

        tracing::info!(
            "Sync complete: {} new, {} updated, {} deleted, {} unchanged",
            summary.discovered,
            summary.updated,
            summary.deleted,
            summary.unchanged
        );
        reporter.report(&SyncEvent::Done { summary });
        Ok(summary)
    }

    /// Fetch one job and create or update its snapshot.
    async fn apply(&self, name: &str, reporter: &mut dyn Reporter) -> Result<JobOutcome, ReconcileError> {
        let config = self
            .remote
            .get_config(name)
            .await
            .map_err(|source| ReconcileError::Fetch {
                name: name.to_string(),
                source,
            })?;

        let Some(config) = config.filter(|c| !c.is_empty()) else {
            return Ok(JobOutcome::Vanished);
        };

        if !self.store.exists(name).await? {
            reporter.report(&SyncEvent::Discovered {
                name: name.to_string(),
            });
            self.store.write(name, config.as_bytes()).await?;
            return Ok(JobOutcome::Discovered);
        }

        let diff = self.store.diff_lines(name, config.as_bytes()).await?;
        if diff.is_empty() {
            return Ok(JobOutcome::Unchanged);
        }

        reporter.report(&SyncEvent::Updated {
            name: name.to_string(),
            diff,
        });
        self.store.write(name, config.as_bytes()).await?;
        Ok(JobOutcome::Updated)
    }

    /// Delete every snapshot whose job was not seen. Returns the number deleted.
    ///
    /// Works from names only; snapshot contents are never read here.
    async fn sweep(&self, seen: &HashSet<String>, reporter: &mut dyn Reporter) -> Result<usize, ReconcileError> {
        let mut stale = Vec::new();
        let mut names = self.store.list_names();
        while let Some(name) = names.next().await {
            let name = name?;
            if !seen.contains(&name) {
                stale.push(name);
            }
        }
        drop(names);

        for name in &stale {
            reporter.report(&SyncEvent::Deleted { name: name.clone() });
            self.store.delete(name).await?;
        }
        Ok(stale.len())
    }

    fn tolerates(&self, error: &ReconcileError) -> bool {
        if self.policy != ErrorPolicy::Continue {
            return false;
        }
        match error {
            ReconcileError::Fetch { source, .. } => !source.is_fatal(),
            ReconcileError::Store(_) => true,
            ReconcileError::Remote(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockSource;
    use mirror_core::RecordingReporter;
    use mirror_store::{FsSnapshotStore, MemoryStore};
    use tempfile::tempdir;

    fn reconciler(remote: &MockSource, store: &MemoryStore) -> Reconciler<MockSource, MemoryStore> {
        Reconciler::new(remote.clone(), store.clone())
    }

    async fn run(
        reconciler: &Reconciler<MockSource, MemoryStore>,
    ) -> (Result<SyncSummary, ReconcileError>, RecordingReporter) {
        let mut reporter = RecordingReporter::new();
        let result = reconciler.run(&mut reporter).await;
        (result, reporter)
    }

    #[tokio::test]
    async fn creates_snapshots_for_new_jobs() {
        let remote = MockSource::new();
        remote.add_job("A", "x");
        remote.add_job("B", "y");
        let store = MemoryStore::new();

        let (result, events) = run(&reconciler(&remote, &store)).await;
        let summary = result.unwrap();

        assert_eq!(summary.discovered, 2);
        assert_eq!(events.discovered(), vec!["A", "B"]);
        assert!(events.updated().is_empty());
        assert!(events.deleted().is_empty());
        assert_eq!(store.read("A").await.unwrap(), b"x");
        assert_eq!(store.read("B").await.unwrap(), b"y");
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let remote = MockSource::new();
        remote.add_job("A", "x");
        remote.add_job("folder/B", "y");
        let store = MemoryStore::new();
        let reconciler = reconciler(&remote, &store);

        run(&reconciler).await.0.unwrap();
        let writes = store.writes();

        let (result, events) = run(&reconciler).await;
        let summary = result.unwrap();

        assert_eq!(summary.changes(), 0);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(store.writes(), writes);
        assert_eq!(store.deletes(), 0);
        assert_eq!(
            events.changes(),
            vec![&SyncEvent::Done { summary }],
            "unchanged jobs must be silent"
        );
    }

    #[tokio::test]
    async fn detects_updates_with_diff() {
        let remote = MockSource::new();
        remote.add_job("A", "x2");
        let store = MemoryStore::new();
        store.write("A", b"x").await.unwrap();

        let (result, events) = run(&reconciler(&remote, &store)).await;
        assert_eq!(result.unwrap().updated, 1);

        let diffs: Vec<&Vec<String>> = events
            .events()
            .iter()
            .filter_map(|e| match e {
                SyncEvent::Updated { name, diff } if name == "A" => Some(diff),
                _ => None,
            })
            .collect();
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].contains(&"-x".to_string()));
        assert!(diffs[0].contains(&"+x2".to_string()));
        assert_eq!(store.read("A").await.unwrap(), b"x2");
    }

    #[tokio::test]
    async fn deletes_snapshots_of_removed_jobs() {
        let remote = MockSource::new();
        remote.add_job("A", "a");
        let store = MemoryStore::new();
        store.write("A", b"a").await.unwrap();
        store.write("B", b"b").await.unwrap();
        let writes = store.writes();

        let (result, events) = run(&reconciler(&remote, &store)).await;
        let summary = result.unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(events.deleted(), vec!["B"]);
        assert!(events.updated().is_empty());
        assert!(!store.exists("B").await.unwrap());
        assert_eq!(store.read("A").await.unwrap(), b"a");
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn vanished_job_is_deleted_exactly_once() {
        let remote = MockSource::new();
        remote.add_job("A", "a");
        remote.add_job("C", "c2");
        remote.vanish("C");
        let store = MemoryStore::new();
        store.write("C", b"c").await.unwrap();
        let reconciler = reconciler(&remote, &store);

        let (result, events) = run(&reconciler).await;
        let summary = result.unwrap();
        assert_eq!(summary.vanished, 1);
        assert_eq!(events.deleted(), vec!["C"]);
        assert!(events.updated().is_empty());
        assert!(!store.exists("C").await.unwrap());

        // Later pass: C is no longer listed at all
        remote.remove_job("C");
        let (result, events) = run(&reconciler).await;
        result.unwrap();
        assert!(events.deleted().is_empty());
        assert_eq!(store.deletes(), 1);
    }

    #[tokio::test]
    async fn vanished_job_without_snapshot_is_ignored() {
        let remote = MockSource::new();
        remote.add_job("ghost", "x");
        remote.vanish("ghost");
        let store = MemoryStore::new();

        let (result, events) = run(&reconciler(&remote, &store)).await;
        let summary = result.unwrap();

        assert_eq!(summary.vanished, 1);
        assert_eq!(summary.changes(), 0);
        assert!(store.is_empty());
        assert_eq!(events.changes().len(), 1);
    }

    #[tokio::test]
    async fn empty_payload_counts_as_vanished() {
        let remote = MockSource::new();
        remote.add_job("empty", "");
        let store = MemoryStore::new();
        store.write("empty", b"old").await.unwrap();

        let (result, events) = run(&reconciler(&remote, &store)).await;
        assert_eq!(result.unwrap().vanished, 1);
        assert_eq!(events.deleted(), vec!["empty"]);
    }

    #[tokio::test]
    async fn processes_jobs_in_remote_order() {
        let remote = MockSource::new();
        for name in ["zeta", "alpha", "mid"] {
            remote.add_job(name, name);
        }
        let store = MemoryStore::new();

        let (_, events) = run(&reconciler(&remote, &store)).await;
        let processing: Vec<&str> = events
            .events()
            .iter()
            .filter_map(|e| match e {
                SyncEvent::Processing { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(processing, vec!["zeta", "alpha", "mid"]);
        assert_eq!(remote.fetched(), vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn done_is_the_last_event() {
        let remote = MockSource::new();
        remote.add_job("A", "a");
        let store = MemoryStore::new();
        store.write("old", b"o").await.unwrap();

        let (result, events) = run(&reconciler(&remote, &store)).await;
        let summary = result.unwrap();
        assert_eq!(
            events.events().last(),
            Some(&SyncEvent::Done { summary })
        );
    }

    #[tokio::test]
    async fn list_failure_changes_nothing() {
        let remote = MockSource::new();
        remote.fail_next_list(RemoteError::Unavailable("connection refused".into()));
        let store = MemoryStore::new();
        store.write("A", b"a").await.unwrap();

        let (result, events) = run(&reconciler(&remote, &store)).await;
        assert!(matches!(result, Err(ReconcileError::Remote(_))));
        assert!(events.events().is_empty());
        assert!(store.exists("A").await.unwrap());
        assert_eq!(store.deletes(), 0);
    }

    #[tokio::test]
    async fn store_error_aborts_but_keeps_earlier_writes() {
        let remote = MockSource::new();
        remote.add_job("A", "a");
        remote.add_job("B", "b");
        remote.add_job("C", "c");
        let store = MemoryStore::new();
        store.write("stale", b"s").await.unwrap();
        store.fail_writes_for("B", "disk full");

        let (result, events) = run(&reconciler(&remote, &store)).await;
        let err = result.unwrap_err();

        assert!(matches!(err, ReconcileError::Store(StoreError::Io { .. })));
        assert!(err.to_string().contains("'B'"), "got: {err}");
        assert_eq!(store.read("A").await.unwrap(), b"a");
        assert!(!store.exists("C").await.unwrap());
        // No sweep after an aborted discovery phase
        assert!(store.exists("stale").await.unwrap());
        assert!(!events
            .events()
            .iter()
            .any(|e| matches!(e, SyncEvent::Done { .. })));
    }

    #[tokio::test]
    async fn fetch_error_aborts_by_default() {
        let remote = MockSource::new();
        remote.add_job("A", "a");
        remote.add_job("B", "b");
        remote.fail_config_for("B", "timeout");
        let store = MemoryStore::new();

        let (result, _) = run(&reconciler(&remote, &store)).await;
        match result {
            Err(ReconcileError::Fetch { name, .. }) => assert_eq!(name, "B"),
            other => panic!("expected fetch error, got {other:?}"),
        }
        assert!(store.exists("A").await.unwrap());
    }

    #[tokio::test]
    async fn continue_policy_skips_failed_jobs_and_keeps_their_snapshots() {
        let remote = MockSource::new();
        remote.add_job("A", "a");
        remote.add_job("B", "b2");
        remote.add_job("C", "c");
        remote.fail_config_for("B", "timeout");
        let store = MemoryStore::new();
        store.write("B", b"b").await.unwrap();
        store.write("gone", b"g").await.unwrap();
        let reconciler = reconciler(&remote, &store).with_policy(ErrorPolicy::Continue);

        let (result, events) = run(&reconciler).await;
        let summary = result.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.discovered, 2);
        assert_eq!(events.failed(), vec!["B"]);
        assert_eq!(events.deleted(), vec!["gone"]);
        assert_eq!(store.read("B").await.unwrap(), b"b");
        assert!(store.exists("C").await.unwrap());
    }

    #[tokio::test]
    async fn continue_policy_skips_failed_writes() {
        let remote = MockSource::new();
        remote.add_job("A", "a");
        remote.add_job("B", "b");
        let store = MemoryStore::new();
        store.fail_writes_for("A", "read-only");
        let reconciler = reconciler(&remote, &store).with_policy(ErrorPolicy::Continue);

        let (result, events) = run(&reconciler).await;
        let summary = result.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(events.failed(), vec!["A"]);
        assert_eq!(store.read("B").await.unwrap(), b"b");
    }

    #[test]
    fn continue_policy_still_aborts_on_rejected_credentials() {
        let remote = MockSource::new();
        remote.add_job("A", "a");
        let store = MemoryStore::new();
        let reconciler = reconciler(&remote, &store).with_policy(ErrorPolicy::Continue);
        let unauthorized = ReconcileError::Fetch {
            name: "A".into(),
            source: RemoteError::Unauthorized {
                url: "u".into(),
                status: 401,
            },
        };

        assert!(!reconciler.tolerates(&unauthorized));
    }

    #[tokio::test]
    async fn reconciles_a_directory_end_to_end() {
        let dir = tempdir().unwrap();
        let remote = MockSource::new();
        remote.add_job("folder/deploy", "<project>\n  <v>1</v>\n</project>");
        remote.add_job("release notes", "<project/>");
        let store = FsSnapshotStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("removed.xml"), "<project/>").unwrap();
        std::fs::write(dir.path().join("README"), "not a snapshot").unwrap();
        let reconciler = Reconciler::new(remote.clone(), store);

        let mut events = RecordingReporter::new();
        let summary = reconciler.run(&mut events).await.unwrap();
        assert_eq!(summary.discovered, 2);
        assert_eq!(events.deleted(), vec!["removed"]);
        assert!(dir.path().join("folder%2Fdeploy.xml").is_file());
        assert!(dir.path().join("release%20notes.xml").is_file());
        assert!(dir.path().join("README").is_file());

        remote.add_job("folder/deploy", "<project>\n  <v>2</v>\n</project>");
        let mut events = RecordingReporter::new();
        let summary = reconciler.run(&mut events).await.unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(events.updated(), vec!["folder/deploy"]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("folder%2Fdeploy.xml")).unwrap(),
            "<project>\n  <v>2</v>\n</project>"
        );
    }

    #[tokio::test]
    async fn delete_failure_is_fatal_under_every_policy() {
        for policy in [ErrorPolicy::FailFast, ErrorPolicy::Continue] {
            let remote = MockSource::new();
            remote.add_job("A", "a");
            let store = MemoryStore::new();
            store.write("A", b"a").await.unwrap();
            store.write("stuck", b"s").await.unwrap();
            store.fail_deletes_for("stuck", "read-only");
            let before = store.contents();
            let reconciler = reconciler(&remote, &store).with_policy(policy);

            let (result, events) = run(&reconciler).await;

            assert!(
                matches!(result, Err(ReconcileError::Store(StoreError::Io { op: "delete", .. }))),
                "{policy:?}: got {result:?}"
            );
            assert_eq!(events.deleted(), vec!["stuck"]);
            assert!(events.failed().is_empty());
            assert!(!events
                .events()
                .iter()
                .any(|e| matches!(e, SyncEvent::Done { .. })));
            assert_eq!(store.contents(), before);
        }
    }

    #[tokio::test]
    async fn listing_failure_during_sweep_is_fatal_under_every_policy() {
        for policy in [ErrorPolicy::FailFast, ErrorPolicy::Continue] {
            let dir = tempdir().unwrap();
            let root = dir.path().join("mirror");
            let store = FsSnapshotStore::open(&root).await.unwrap();
            std::fs::remove_dir(&root).unwrap();
            let reconciler = Reconciler::new(MockSource::new(), store).with_policy(policy);

            let mut events = RecordingReporter::new();
            let result = reconciler.run(&mut events).await;

            assert!(
                matches!(result, Err(ReconcileError::Store(StoreError::Root { .. }))),
                "{policy:?}: got {result:?}"
            );
            assert!(events.changes().is_empty());
        }
    }

    #[tokio::test]
    async fn non_utf8_snapshots_are_swept_and_overwritten() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("legacy.xml"), b"<\xff>").unwrap();
        std::fs::write(dir.path().join("A.xml"), b"<\xff>").unwrap();
        let remote = MockSource::new();
        remote.add_job("A", "<new/>");
        let store = FsSnapshotStore::open(dir.path()).await.unwrap();

        let mut events = RecordingReporter::new();
        let summary = Reconciler::new(remote, store).run(&mut events).await.unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(events.deleted(), vec!["legacy"]);
        assert!(!dir.path().join("legacy.xml").exists());
        assert_eq!(std::fs::read(dir.path().join("A.xml")).unwrap(), b"<new/>");
    }

    #[tokio::test]
    async fn longest_job_names_do_not_block_later_jobs() {
        let dir = tempdir().unwrap();
        let long = "a".repeat(250);
        let remote = MockSource::new();
        remote.add_job("first", "1");
        remote.add_job(&long, "2");
        remote.add_job("last", "3");
        let store = FsSnapshotStore::open(dir.path()).await.unwrap();

        let mut events = RecordingReporter::new();
        let summary = Reconciler::new(remote, store).run(&mut events).await.unwrap();

        assert_eq!(summary.discovered, 3);
        assert_eq!(events.discovered(), vec!["first", long.as_str(), "last"]);
        assert!(dir.path().join(format!("{long}.xml")).is_file());
        assert!(dir.path().join("last.xml").is_file());
    }
}
