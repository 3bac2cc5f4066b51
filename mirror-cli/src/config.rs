//! Configuration management for jobmirror.
//!
//! Settings come from three layers, highest priority first: command-line
//! flags, an optional TOML file, and built-in defaults. The result is a
//! [`MirrorConfig`] that is passed explicitly to the sync.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use mirror_client::ErrorPolicy;
use serde::Deserialize;
use zeroize::Zeroizing;

/// Snapshot directory used when none is configured.
pub const DEFAULT_SNAPSHOT_ROOT: &str = "~/jenkins_config";

/// Configuration file contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Remote server settings.
    #[serde(default)]
    pub remote: RemoteSection,
    /// Local mirror settings.
    #[serde(default)]
    pub mirror: MirrorSection,
}

/// `[remote]` section.
#[derive(Clone, Deserialize)]
pub struct RemoteSection {
    /// Base URL of the Jenkins server.
    pub url: Option<String>,
    /// Account name.
    pub username: Option<String>,
    /// Account password or API token.
    pub password: Option<String>,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[mirror]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MirrorSection {
    /// Directory holding the snapshots.
    pub snapshot_root: Option<PathBuf>,
    /// Carry on past per-job errors (default: false).
    #[serde(default)]
    pub keep_going: bool,
}

fn default_timeout_secs() -> u64 {
    mirror_client::DEFAULT_TIMEOUT.as_secs()
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for RemoteSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSection")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl FileConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path` if given, else the per-user config file if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => {
                tracing::debug!("Using config file {}", path.display());
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub conf_dir: Option<PathBuf>,
    pub keep_going: bool,
}

/// Everything a sync run needs, resolved before it starts.
#[derive(Clone)]
pub struct MirrorConfig {
    /// Base URL of the Jenkins server.
    pub remote_url: String,
    /// Account name.
    pub username: String,
    /// Password, if known; otherwise it is prompted for.
    pub password: Option<Zeroizing<String>>,
    /// Snapshot directory, tilde-expanded.
    pub snapshot_root: PathBuf,
    /// Per-job error handling.
    pub error_policy: ErrorPolicy,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("remote_url", &self.remote_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("snapshot_root", &self.snapshot_root)
            .field("error_policy", &self.error_policy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MirrorConfig {
    /// Merge flags over the file, then fill the remaining gaps.
    ///
    /// `env_user` is the login name of the invoking user and `home` their
    /// home directory; both are looked up by the caller.
    pub fn resolve(
        flags: Overrides,
        file: FileConfig,
        env_user: Option<String>,
        home: Option<&Path>,
    ) -> Result<Self> {
        let remote_url = flags
            .url
            .or(file.remote.url)
            .context("No remote URL configured. Pass --url or set remote.url in the config file.")?;

        let username = flags
            .username
            .or(file.remote.username)
            .or(env_user)
            .context("No username configured. Pass --username or set remote.username.")?;

        let password = flags.password.or(file.remote.password).map(Zeroizing::new);

        let snapshot_root = flags
            .conf_dir
            .or(file.mirror.snapshot_root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_ROOT));
        let snapshot_root = expand_tilde(&snapshot_root, home)?;

        let error_policy = if flags.keep_going || file.mirror.keep_going {
            ErrorPolicy::Continue
        } else {
            ErrorPolicy::FailFast
        };

        Ok(Self {
            remote_url,
            username,
            password,
            snapshot_root,
            error_policy,
            timeout: Duration::from_secs(file.remote.timeout_secs),
        })
    }
}

/// Replace a leading `~` component with the home directory.
pub fn expand_tilde(path: &Path, home: Option<&Path>) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = home.context("Cannot expand '~': home directory unknown")?;
    Ok(home.join(rest))
}

/// The invoking user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

/// Per-user config file location, e.g. `~/.config/jobmirror/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "jobmirror", "jobmirror")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
