//! Entry points invoked by the scheduler and the webhook receiver.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{self, loader};
use crate::event::ActivityEvent;
use crate::github::{GitHubApi, RepoRef, Unsubscribe};
use crate::labeler::{Labeler, LabelerError, SweepReport, UnmarkOutcome};

/// Wires settings resolution, the engine and scheduling control together.
#[derive(Clone)]
pub struct LabelerApp {
    github: Arc<dyn GitHubApi>,
    scheduler: Arc<dyn Unsubscribe>,
    dry_run: bool,
}

impl LabelerApp {
    #[must_use]
    pub fn new(github: Arc<dyn GitHubApi>, scheduler: Arc<dyn Unsubscribe>, dry_run: bool) -> Self {
        Self {
            github,
            scheduler,
            dry_run,
        }
    }

    /// Periodic tick for one repository: run a sweep.
    ///
    /// Returns `None` when the repository has no settings; it is then
    /// unsubscribed and nothing is searched.
    pub async fn on_schedule(&self, repo: &RepoRef) -> Result<Option<SweepReport>, LabelerError> {
        let (labeler, configured) = self.for_repository(repo).await?;
        if !configured {
            return Ok(None);
        }
        labeler.do_mark().await.map(Some)
    }

    /// Activity webhook: possibly remove the lifecycle label.
    pub async fn on_activity(&self, event: &ActivityEvent) -> Result<UnmarkOutcome, LabelerError> {
        if event.is_bot() {
            debug!(
                repository = %event.repository,
                number = event.number(),
                event = event.kind.as_str(),
                "Ignoring activity from a bot"
            );
            return Ok(UnmarkOutcome::BotActor);
        }

        // Without settings the labeler never performs, so this only logs.
        let (labeler, _) = self.for_repository(&event.repository).await?;
        labeler.unmark(event).await
    }

    /// Resolve settings for `repo` and build a labeler.
    ///
    /// The flag is false when the repository has no settings. It is then
    /// unsubscribed and the labeler runs with `perform` off.
    async fn for_repository(&self, repo: &RepoRef) -> Result<(Labeler, bool), LabelerError> {
        let document = loader::load_document(self.github.as_ref(), repo)
            .await
            .map_err(|source| LabelerError::Settings {
                repository: repo.clone(),
                source,
            })?;

        let resolution = config::resolve(document.as_ref().map(|d| &d.value), repo, self.dry_run);

        if resolution.missing {
            info!(
                owner = %repo.owner,
                repo = %repo.name,
                "No settings found, unsubscribing repository"
            );
            self.scheduler.unsubscribe(repo).await;
            return Ok((Labeler::new(self.github.clone(), resolution.config), false));
        }

        let load_errors = document.map(|d| d.errors).unwrap_or_default();
        for message in load_errors.iter().chain(&resolution.errors) {
            warn!(
                owner = %repo.owner,
                repo = %repo.name,
                message = %message,
                "Invalid config"
            );
        }

        Ok((Labeler::new(self.github.clone(), resolution.config), true))
    }
}
