//! Periodic sweep trigger.
//!
//! Every `interval` the scheduler starts one sweep per subscribed repository,
//! each in its own task. A repository leaves the rotation when the labeler
//! unsubscribes it (no settings document).

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::app::LabelerApp;
use crate::github::{RepoRef, Unsubscribe};

/// Summary of one scheduling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub swept: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct RepoScheduler {
    repos: RwLock<BTreeSet<RepoRef>>,
    interval: Duration,
}

impl RepoScheduler {
    #[must_use]
    pub fn new(repos: impl IntoIterator<Item = RepoRef>, interval: Duration) -> Self {
        Self {
            repos: RwLock::new(repos.into_iter().collect()),
            interval,
        }
    }

    pub async fn subscribe(&self, repo: RepoRef) {
        self.repos.write().await.insert(repo);
    }

    pub async fn subscribed(&self) -> Vec<RepoRef> {
        self.repos.read().await.iter().cloned().collect()
    }

    /// Tick forever. The first cycle starts immediately.
    pub async fn run(self: Arc<Self>, app: LabelerApp) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let summary = self.run_cycle(&app).await;
            info!(
                swept = summary.swept,
                skipped = summary.skipped,
                failed = summary.failed,
                "Scheduling cycle complete"
            );
        }
    }

    /// Sweep every subscribed repository once, concurrently.
    pub async fn run_cycle(&self, app: &LabelerApp) -> CycleSummary {
        let mut tasks = JoinSet::new();
        for repo in self.subscribed().await {
            let app = app.clone();
            tasks.spawn(async move {
                let result = app.on_schedule(&repo).await;
                (repo, result)
            });
        }

        let mut summary = CycleSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Some(_)))) => summary.swept += 1,
                Ok((_, Ok(None))) => summary.skipped += 1,
                Ok((repo, Err(e))) => {
                    summary.failed += 1;
                    error!(repository = %repo, error = %e, "Sweep failed");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(error = %e, "Sweep task panicked");
                }
            }
        }
        summary
    }
}

#[async_trait]
impl Unsubscribe for RepoScheduler {
    async fn unsubscribe(&self, repo: &RepoRef) {
        if self.repos.write().await.remove(repo) {
            info!(repository = %repo, "Stopped scheduling sweeps");
        }
    }
}
