//! # jobmirror
//!
//! Keep a local directory mirror of Jenkins job configurations.
//!
//! Every run fetches the configuration of each job on the server and makes
//! the snapshot directory match: new jobs are written, changed jobs are
//! overwritten (with a diff printed), and snapshots of deleted jobs are
//! removed. Put the directory under version control to get a history.
//!
//! ## Example
//!
//! ```bash
//! # Prompts for the password of $USER
//! jobmirror --url https://ci.example.com/
//!
//! # Explicit account and directory, tolerate per-job errors
//! jobmirror -U https://ci.example.com/ -u alice -c ~/ci-mirror --keep-going
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod reporter;
mod sync;

use config::{FileConfig, MirrorConfig, Overrides};
use reporter::ConsoleReporter;

/// Keep a local directory mirror of Jenkins job configurations.
#[derive(Parser, Debug)]
#[command(name = "jobmirror")]
#[command(version, about, long_about = None)]
struct Cli {
    /// The URL for Jenkins
    #[arg(long = "url", short = 'U')]
    url: Option<String>,

    /// The username to use for accessing Jenkins (default: $USER)
    #[arg(long, short = 'u')]
    username: Option<String>,

    /// The password to use for accessing Jenkins (will prompt if not provided)
    #[arg(long, short = 'P')]
    password: Option<String>,

    /// The directory in which Jenkins job configuration will be kept
    /// (default: ~/jenkins_config)
    #[arg(long = "conf-dir", short = 'c')]
    conf_dir: Option<PathBuf>,

    /// Path to a TOML config file (default: per-user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report jobs that fail to sync and carry on instead of aborting
    #[arg(long)]
    keep_going: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn overrides(self) -> Overrides {
        Overrides {
            url: self.url,
            username: self.username,
            password: self.password,
            conf_dir: self.conf_dir,
            keep_going: self.keep_going,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let file = FileConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let env_user = std::env::var("USER").ok().filter(|u| !u.is_empty());
    let home = config::home_dir();
    let config = MirrorConfig::resolve(cli.overrides(), file, env_user, home.as_deref())?;
    tracing::debug!("Resolved configuration: {:?}", config);

    let mut reporter = ConsoleReporter::stdout();
    let summary = sync::run(&config, &mut reporter).await?;

    if summary.failed > 0 {
        anyhow::bail!("{} job(s) could not be synced", summary.failed);
    }

    Ok(())
}

/// Install the log subscriber. `RUST_LOG` wins over `--debug`.
fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("jobmirror=debug,jobmirror_client=debug,jobmirror_store=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
