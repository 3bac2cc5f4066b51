//! Run one sync against the configured server.

use anyhow::{Context, Result};
use mirror_client::{Credentials, JenkinsSource, Reconciler, SyncSummary};
use mirror_core::Reporter;
use mirror_store::FsSnapshotStore;
use zeroize::Zeroizing;

use crate::config::MirrorConfig;

/// Run the sync: open the snapshot directory, authenticate, reconcile.
pub async fn run(config: &MirrorConfig, reporter: &mut dyn Reporter) -> Result<SyncSummary> {
    let store = FsSnapshotStore::open(&config.snapshot_root)
        .await
        .with_context(|| format!("Cannot use snapshot directory {}", config.snapshot_root.display()))?;

    let password = match &config.password {
        Some(password) => password.clone(),
        None => prompt_password(&config.username)?,
    };
    let credentials = Credentials::new(config.username.as_str(), password.as_str());

    let remote = JenkinsSource::new(&config.remote_url, Some(credentials), config.timeout)
        .context("Invalid remote configuration")?;
    tracing::info!(
        "Syncing {} into {}",
        config.remote_url,
        config.snapshot_root.display()
    );

    let summary = Reconciler::new(remote, store)
        .with_policy(config.error_policy)
        .run(reporter)
        .await?;
    Ok(summary)
}

/// Prompt for the password with echo suppression.
fn prompt_password(username: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(format!("Password for {username}: "))
        .context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}
