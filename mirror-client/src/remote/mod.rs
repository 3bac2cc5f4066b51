//! Remote job source abstraction.
//!
//! A remote source is the authoritative list of CI jobs and their
//! configurations. The reconciler only needs two calls:
//! - `list_jobs()` enumerates the jobs that exist right now
//! - `get_config()` fetches one job's configuration payload, or `None`
//!   when the job disappeared after it was listed
//!
//! # Example
//!
//! ```ignore
//! let source = MockSource::new();
//! source.add_job("build", "<project/>");
//! let jobs = source.list_jobs().await?;
//! let config = source.get_config(&jobs[0].name).await?;
//! ```

mod jenkins;
mod mock;

pub use jenkins::{Credentials, JenkinsSource, DEFAULT_TIMEOUT};
pub use mock::MockSource;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Remote source errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The configured server URL cannot be used.
    #[error("invalid server URL '{0}'")]
    InvalidUrl(String),

    /// The server could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The server rejected the credentials.
    #[error("authentication rejected by {url} (HTTP {status})")]
    Unauthorized {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The server answered with an unexpected status.
    #[error("unexpected HTTP {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Errors that no other job in the same run can avoid.
    ///
    /// These abort a run even when per-job errors are tolerated.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidUrl(_) | Self::Unauthorized { .. })
    }
}

/// A job as reported by the remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobSummary {
    /// Job name, exactly as the server reports it.
    pub name: String,
}

impl JobSummary {
    /// Create a summary for the named job.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Source of truth for the set of jobs and their configurations.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// List every job currently known to the remote, in the remote's order.
    async fn list_jobs(&self) -> Result<Vec<JobSummary>, RemoteError>;

    /// Fetch a job's configuration payload.
    ///
    /// Returns `Ok(None)` if the job no longer exists.
    async fn get_config(&self, name: &str) -> Result<Option<String>, RemoteError>;
}
