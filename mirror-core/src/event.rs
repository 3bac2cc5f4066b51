//! Sync events emitted during a reconciliation run.
//!
//! The reconciler never writes to the terminal. It emits [`SyncEvent`]s to a
//! [`Reporter`], and the presentation layer decides how to render them.

/// Counters for one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Jobs seen for the first time.
    pub discovered: usize,
    /// Jobs whose snapshot was overwritten.
    pub updated: usize,
    /// Jobs whose snapshot already matched.
    pub unchanged: usize,
    /// Snapshots removed because their job is gone.
    pub deleted: usize,
    /// Jobs listed by the remote that disappeared before their config was fetched.
    pub vanished: usize,
    /// Jobs skipped after an error (only with a continue-on-error policy).
    pub failed: usize,
}

impl SyncSummary {
    /// Number of snapshot writes and deletes performed.
    pub fn changes(&self) -> usize {
        self.discovered + self.updated + self.deleted
    }
}

/// An observable step of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// About to fetch the configuration of a job.
    Processing {
        /// Job name.
        name: String,
    },
    /// A job without a snapshot was found and stored.
    Discovered {
        /// Job name.
        name: String,
    },
    /// A job's remote configuration differs from its snapshot.
    Updated {
        /// Job name.
        name: String,
        /// Unified diff from snapshot to remote.
        diff: Vec<String>,
    },
    /// A snapshot was removed because its job no longer exists.
    Deleted {
        /// Job name.
        name: String,
    },
    /// A job was skipped after an error.
    Failed {
        /// Job name.
        name: String,
        /// Human-readable error.
        message: String,
    },
    /// The run finished.
    Done {
        /// Run counters.
        summary: SyncSummary,
    },
}

/// Receives sync events. Has no influence on the run.
pub trait Reporter {
    /// Handle one event.
    fn report(&mut self, event: &SyncEvent);
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&mut self, _event: &SyncEvent) {}
}

/// Reporter that keeps every event, for inspection in tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    events: Vec<SyncEvent>,
}

impl RecordingReporter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in order.
    pub fn events(&self) -> &[SyncEvent] {
        &self.events
    }

    /// Recorded events, without the `Processing` status events.
    pub fn changes(&self) -> Vec<&SyncEvent> {
        self.events
            .iter()
            .filter(|e| !matches!(e, SyncEvent::Processing { .. }))
            .collect()
    }

    /// Names carried by `Discovered` events.
    pub fn discovered(&self) -> Vec<&str> {
        self.names(|e| match e {
            SyncEvent::Discovered { name } => Some(name),
            _ => None,
        })
    }

    /// Names carried by `Updated` events.
    pub fn updated(&self) -> Vec<&str> {
        self.names(|e| match e {
            SyncEvent::Updated { name, .. } => Some(name),
            _ => None,
        })
    }

    /// Names carried by `Deleted` events.
    pub fn deleted(&self) -> Vec<&str> {
        self.names(|e| match e {
            SyncEvent::Deleted { name } => Some(name),
            _ => None,
        })
    }

    /// Names carried by `Failed` events.
    pub fn failed(&self) -> Vec<&str> {
        self.names(|e| match e {
            SyncEvent::Failed { name, .. } => Some(name),
            _ => None,
        })
    }

    fn names<'a>(&'a self, pick: impl Fn(&'a SyncEvent) -> Option<&'a String>) -> Vec<&'a str> {
        self.events
            .iter()
            .filter_map(pick)
            .map(String::as_str)
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&mut self, event: &SyncEvent) {
        self.events.push(event.clone());
    }
}
