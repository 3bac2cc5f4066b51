//! Jenkins remote source over the JSON/XML HTTP API.
//!
//! - Job list: `GET <base>/api/json?tree=jobs[name]`
//! - Job config: `GET <base>/job/<a>/job/<b>/config.xml` for job `a/b`
//!
//! Requests use HTTP basic auth when credentials are configured.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use super::{JobSummary, RemoteError, RemoteSource};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Username and password for the CI server.
#[derive(Clone)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Create credentials. The password is wiped from memory on drop.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// The password.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<JobSummary>,
}

/// Remote source backed by a Jenkins server.
#[derive(Debug, Clone)]
pub struct JenkinsSource {
    http: reqwest::Client,
    base: Url,
    credentials: Option<Credentials>,
}

impl JenkinsSource {
    /// Create a source for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if the URL does not parse or cannot carry a path,
    /// and `Unavailable` if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let base = Url::parse(base_url).map_err(|_| RemoteError::InvalidUrl(base_url.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("jobmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base,
            credentials,
        })
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// URL of the job listing.
    pub fn jobs_url(&self) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "json"]);
        }
        url.query_pairs_mut().append_pair("tree", "jobs[name]");
        url
    }

    /// URL of a job's `config.xml`. Slashes in the name address folders.
    pub fn config_url(&self, name: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for part in name.split('/') {
                segments.push("job").push(part);
            }
            segments.push("config.xml");
        }
        url
    }

    async fn get(&self, url: &Url) -> Result<Response, RemoteError> {
        let mut request = self.http.get(url.clone());
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(creds.password()));
        }
        tracing::debug!("GET {}", url);
        request
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("{url}: {e}")))
    }
}

/// Map authentication and other non-success statuses to errors.
fn check_status(url: &Url, status: StatusCode) -> Result<(), RemoteError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(RemoteError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[async_trait]
impl RemoteSource for JenkinsSource {
    async fn list_jobs(&self) -> Result<Vec<JobSummary>, RemoteError> {
        let url = self.jobs_url();
        let response = self.get(&url).await?;
        check_status(&url, response.status())?;

        let list: JobList = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(format!("{url}: {e}")))?;
        tracing::debug!("{} listed {} jobs", self.base, list.jobs.len());
        Ok(list.jobs)
    }

    async fn get_config(&self, name: &str) -> Result<Option<String>, RemoteError> {
        let url = self.config_url(name);
        let response = self.get(&url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Job '{}' not found at {}", name, url);
            return Ok(None);
        }
        check_status(&url, response.status())?;

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::InvalidResponse(format!("{url}: {e}")))?;
        Ok(if body.is_empty() { None } else { Some(body) })
    }
}
