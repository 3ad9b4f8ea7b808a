//! # Mark/Unmark Engine
//!
//! Two independently triggered flows over a single repository:
//!
//! - **Sweep** ([`Labeler::do_mark`]): search for open pull requests that have
//!   been inactive past the threshold and apply the lifecycle label, at most
//!   `limitPerRun` items per invocation.
//! - **Reversal** ([`Labeler::unmark`]): on activity, remove the lifecycle
//!   label again.
//!
//! Dry-run is not a separate code path. Every remote mutation checks
//! `config.perform` at the call site, so decisions and logging are identical
//! in both modes.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::budget::RunBudget;
use crate::config::{LabelerConfig, TIMEOUT_LABEL_COLOR};
use crate::event::ActivityEvent;
use crate::github::{
    Candidate, GitHubApi, GitHubError, ItemState, LabelCreation, LabelRemoval, RepoRef,
};
use crate::query;

#[derive(Debug, Error)]
pub enum LabelerError {
    #[error("failed to load settings for {repository}: {source}")]
    Settings {
        repository: RepoRef,
        #[source]
        source: GitHubError,
    },

    #[error("search for timed out pull requests in {repository} failed: {source}")]
    Search {
        repository: RepoRef,
        #[source]
        source: GitHubError,
    },

    #[error("failed to mark {repository}#{number}: {source}")]
    Mark {
        repository: RepoRef,
        number: u64,
        #[source]
        source: GitHubError,
    },

    #[error("failed to unmark {repository}#{number}: {source}")]
    Unmark {
        repository: RepoRef,
        number: u64,
        #[source]
        source: GitHubError,
    },
}

/// What happened to one candidate of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    /// Dry-run: would have been marked.
    WouldMark,
    /// Carries an exempt label.
    Exempt,
}

/// Tally of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub candidates: usize,
    pub marked: usize,
    pub would_mark: usize,
    pub exempt: usize,
    /// Candidates skipped because the run budget was spent.
    pub over_budget: usize,
}

/// What the reversal flow did for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmarkOutcome {
    /// Label removed; `already_absent` when someone else removed it first.
    Unmarked { already_absent: bool },
    /// Dry-run: would have been unmarked.
    WouldUnmark,
    /// Item does not carry the lifecycle label.
    NotMarked,
    /// Item is closed.
    Closed,
    /// The event is the lifecycle label being applied.
    JustMarked,
    /// Label data could not be fetched.
    Unavailable,
    /// Event caused by an automated account.
    BotActor,
}

impl UnmarkOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unmarked {
                already_absent: false,
            } => "unmarked",
            Self::Unmarked {
                already_absent: true,
            } => "already_unmarked",
            Self::WouldUnmark => "would_unmark",
            Self::NotMarked => "not_marked",
            Self::Closed => "closed",
            Self::JustMarked => "just_marked",
            Self::Unavailable => "unavailable",
            Self::BotActor => "bot_actor",
        }
    }
}

/// Labeler bound to one repository's resolved configuration.
pub struct Labeler {
    github: Arc<dyn GitHubApi>,
    config: LabelerConfig,
}

impl Labeler {
    #[must_use]
    pub fn new(github: Arc<dyn GitHubApi>, config: LabelerConfig) -> Self {
        Self { github, config }
    }

    #[must_use]
    pub fn config(&self) -> &LabelerConfig {
        &self.config
    }

    fn repository(&self) -> &RepoRef {
        &self.config.repository
    }

    /// Run one sweep as of now.
    pub async fn do_mark(&self) -> Result<SweepReport, LabelerError> {
        self.do_mark_at(Utc::now()).await
    }

    /// Run one sweep with an explicit clock.
    pub async fn do_mark_at(&self, now: DateTime<Utc>) -> Result<SweepReport, LabelerError> {
        info!(
            owner = %self.config.owner(),
            repo = %self.config.repo(),
            perform = self.config.perform,
            limit_per_run = self.config.limit_per_run,
            days_until_timeout = self.config.days_until_timeout,
            "Starting mark and sweep of pull requests"
        );

        let mut budget = RunBudget::new(self.config.limit_per_run);

        self.ensure_label_exists().await;

        let params = query::search_params(&self.config, now);
        info!(
            owner = %self.config.owner(),
            repo = %self.config.repo(),
            q = %params.q,
            "Searching for timed out pull requests"
        );
        let candidates =
            self.github
                .search_issues(&params)
                .await
                .map_err(|source| LabelerError::Search {
                    repository: self.repository().clone(),
                    source,
                })?;

        let mut report = SweepReport {
            candidates: candidates.len(),
            ..SweepReport::default()
        };

        // The budget is spent here, before each attempt is dispatched, so the
        // concurrent attempts below can never exceed it.
        let mut attempts = Vec::new();
        for candidate in &candidates {
            if budget.try_consume() {
                attempts.push(self.mark_issue(candidate));
            } else {
                report.over_budget += 1;
                info!(
                    owner = %self.config.owner(),
                    repo = %self.config.repo(),
                    number = candidate.number,
                    "Run budget spent, not marking"
                );
            }
        }

        let mut first_error = None;
        for outcome in join_all(attempts).await {
            match outcome {
                Ok(MarkOutcome::Marked) => report.marked += 1,
                Ok(MarkOutcome::WouldMark) => report.would_mark += 1,
                Ok(MarkOutcome::Exempt) => report.exempt += 1,
                Err(e) => {
                    warn!(error = %e, "Mark attempt failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        info!(
            owner = %self.config.owner(),
            repo = %self.config.repo(),
            candidates = report.candidates,
            marked = report.marked,
            would_mark = report.would_mark,
            exempt = report.exempt,
            over_budget = report.over_budget,
            "Sweep finished"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Mark a single candidate. The caller has already charged the budget.
    pub async fn mark_issue(&self, candidate: &Candidate) -> Result<MarkOutcome, LabelerError> {
        let number = candidate.number;
        let owner = self.config.owner();
        let repo = self.config.repo();

        if self.has_exempt_label(&candidate.labels) {
            info!(owner, repo, number, "Item has exempt label, not marking");
            return Ok(MarkOutcome::Exempt);
        }

        if !self.config.perform {
            info!(owner, repo, number, "Would have been marked (dry-run)");
            return Ok(MarkOutcome::WouldMark);
        }

        info!(owner, repo, number, "Marking as timed out");
        let mark_error = |source| LabelerError::Mark {
            repository: self.repository().clone(),
            number,
            source,
        };

        if let Some(body) = &self.config.mark_comment {
            self.github
                .create_comment(self.repository(), number, body)
                .await
                .map_err(mark_error)?;
        }
        self.github
            .add_labels(
                self.repository(),
                number,
                std::slice::from_ref(&self.config.timeout_label),
            )
            .await
            .map_err(mark_error)?;

        Ok(MarkOutcome::Marked)
    }

    /// Reversal flow for one activity event.
    ///
    /// Bot filtering and settings resolution happen before this is called.
    pub async fn unmark(&self, event: &ActivityEvent) -> Result<UnmarkOutcome, LabelerError> {
        let number = event.number();
        let owner = self.config.owner();
        let repo = self.config.repo();
        let item = event.subject.item();

        let (state, labels) = match &item.labels {
            Some(labels) => (item.state, labels.clone()),
            None => match self.github.get_pull_request(self.repository(), number).await {
                Ok(pr) => (pr.state, pr.labels),
                Err(e) => {
                    info!(
                        owner,
                        repo,
                        number,
                        kind = event.subject.kind(),
                        error = %e,
                        "Item not found, cannot read labels"
                    );
                    return Ok(UnmarkOutcome::Unavailable);
                }
            },
        };

        if event.applied_label() == Some(self.config.timeout_label.as_str()) {
            debug!(owner, repo, number, "Event applied the lifecycle label itself");
            return Ok(UnmarkOutcome::JustMarked);
        }

        if !self.has_timeout_label(&labels) {
            debug!(owner, repo, number, "Item is not marked");
            return Ok(UnmarkOutcome::NotMarked);
        }

        if state == ItemState::Closed {
            debug!(owner, repo, number, "Item is closed, leaving label");
            return Ok(UnmarkOutcome::Closed);
        }

        self.unmark_issue(number).await
    }

    /// Remove the lifecycle label from `number` (and post the unmark comment).
    pub async fn unmark_issue(&self, number: u64) -> Result<UnmarkOutcome, LabelerError> {
        let owner = self.config.owner();
        let repo = self.config.repo();

        if !self.config.perform {
            info!(owner, repo, number, "Would have been unmarked (dry-run)");
            return Ok(UnmarkOutcome::WouldUnmark);
        }

        info!(owner, repo, number, "Unmarking");
        let unmark_error = |source| LabelerError::Unmark {
            repository: self.repository().clone(),
            number,
            source,
        };

        if let Some(body) = &self.config.unmark_comment {
            self.github
                .create_comment(self.repository(), number, body)
                .await
                .map_err(unmark_error)?;
        }

        let removal = self
            .github
            .remove_label(self.repository(), number, &self.config.timeout_label)
            .await
            .map_err(unmark_error)?;

        if removal == LabelRemoval::AlreadyAbsent {
            debug!(owner, repo, number, "Label was already removed");
        }

        Ok(UnmarkOutcome::Unmarked {
            already_absent: removal == LabelRemoval::AlreadyAbsent,
        })
    }

    /// True if at least one exempt label is present.
    pub fn has_exempt_label(&self, labels: &[String]) -> bool {
        labels
            .iter()
            .any(|label| self.config.exempt_labels.contains(label))
    }

    pub fn has_timeout_label(&self, labels: &[String]) -> bool {
        labels.contains(&self.config.timeout_label)
    }

    /// Get-or-create the lifecycle label. Failures are logged, never raised.
    async fn ensure_label_exists(&self) {
        let owner = self.config.owner();
        let repo = self.config.repo();
        let label = &self.config.timeout_label;

        match self.github.get_label(self.repository(), label).await {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(e) => warn!(owner, repo, label = %label, error = %e, "Label lookup failed"),
        }

        if !self.config.perform {
            info!(owner, repo, label = %label, "Would have created label (dry-run)");
            return;
        }

        match self
            .github
            .create_label(self.repository(), label, TIMEOUT_LABEL_COLOR)
            .await
        {
            Ok(LabelCreation::Created) => info!(owner, repo, label = %label, "Created label"),
            Ok(LabelCreation::AlreadyExists) => {
                debug!(owner, repo, label = %label, "Label already exists");
            }
            Err(e) => warn!(owner, repo, label = %label, error = %e, "Failed to create label"),
        }
    }
}
