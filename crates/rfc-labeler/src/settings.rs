//! Service settings, from flags or environment.

use clap::Parser;
use std::time::Duration;

use crate::config::dry_run_from_env;
use crate::github::RepoRef;

/// Marks inactive RFC pull requests and unmarks them on new activity.
#[derive(Debug, Clone, Parser)]
#[command(name = "rfc-labeler")]
#[command(version)]
pub struct Settings {
    /// GitHub token used for all API calls
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// GitHub API root
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// Secret for verifying webhook signatures
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// HTTP port for the webhook receiver
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Repositories to sweep (owner/repo, comma-separated)
    #[arg(long, env = "LABELER_REPOSITORIES", value_delimiter = ',')]
    pub repositories: Vec<RepoRef>,

    /// Seconds between sweeps of each repository
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 3600)]
    pub sweep_interval_secs: u64,

    /// Log intended actions without changing anything on GitHub
    #[arg(long)]
    pub dry_run: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub json_logs: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Settings {
    /// Dry-run if requested by flag or by a non-empty `DRY_RUN`.
    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run || dry_run_from_env(std::env::var("DRY_RUN").ok().as_deref())
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
