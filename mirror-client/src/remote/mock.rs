//! Mock remote source for testing.
//!
//! Holds a scripted job list and records which configurations were fetched.

use super::{JobSummary, RemoteError, RemoteSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock remote source for testing.
///
/// Jobs are listed in insertion order. A job can be made to vanish (listed,
/// but `get_config` returns `None`) or to fail.
#[derive(Debug, Default)]
pub struct MockSource {
    inner: Arc<Mutex<MockSourceInner>>,
}

#[derive(Debug, Default)]
struct MockSourceInner {
    jobs: Vec<(String, Option<String>)>,
    fetched: Vec<String>,
    fail_next_list: Option<RemoteError>,
    fail_config: HashMap<String, String>,
}

impl MockSource {
    /// Create a new mock source with no jobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job, or replace the configuration of an existing one.
    pub fn add_job(&self, name: &str, config: &str) {
        self.set(name, Some(config.to_string()));
    }

    /// Keep listing the job, but make its configuration fetch return `None`.
    pub fn vanish(&self, name: &str) {
        self.set(name, None);
    }

    /// Stop listing the job.
    pub fn remove_job(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.retain(|(n, _)| n != name);
    }

    /// Cause the next `list_jobs()` to fail with the given error.
    pub fn fail_next_list(&self, error: RemoteError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_list = Some(error);
    }

    /// Make every `get_config()` for the job fail with an HTTP 500.
    pub fn fail_config_for(&self, name: &str, message: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .fail_config
            .insert(name.to_string(), message.to_string());
    }

    /// Names passed to `get_config()`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.fetched.clone()
    }

    fn set(&self, name: &str, config: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        match inner.jobs.iter_mut().find(|(n, _)| n == name) {
            Some(job) => job.1 = config,
            None => inner.jobs.push((name.to_string(), config)),
        }
    }
}

impl Clone for MockSource {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl RemoteSource for MockSource {
    async fn list_jobs(&self) -> Result<Vec<JobSummary>, RemoteError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_list.take() {
            return Err(error);
        }

        Ok(inner
            .jobs
            .iter()
            .map(|(name, _)| JobSummary::new(name.clone()))
            .collect())
    }

    async fn get_config(&self, name: &str) -> Result<Option<String>, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetched.push(name.to_string());

        if let Some(message) = inner.fail_config.get(name) {
            return Err(RemoteError::Status {
                url: format!("mock://job/{name}/config.xml ({message})"),
                status: 500,
            });
        }

        Ok(inner
            .jobs
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, config)| config.clone()))
    }
}
