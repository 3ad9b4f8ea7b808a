//! GitHub capabilities used by the labeler.
//!
//! The engine never talks HTTP directly. It calls through [`GitHubApi`], which
//! [`GitHubClient`] implements against the REST API and tests replace with an
//! in-memory fake.

mod client;
mod error;
#[cfg(test)]
pub(crate) mod fake;

pub use client::GitHubClient;
pub use error::GitHubError;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Repository coordinates (`owner/name`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(format!("expected owner/repo, got {s:?}")),
        }
    }
}

/// Open/closed state of an issue or pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Open,
    Closed,
}

/// A pull request or issue as returned by search or a direct fetch.
///
/// Read-only view of remote state; only the fields the engine decides on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Candidate {
    pub number: u64,
    pub state: ItemState,
    #[serde(default, deserialize_with = "label_names")]
    pub labels: Vec<String>,
}

/// GitHub label object (only the parts we read).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Deserialize a list of label objects into their names.
pub(crate) fn label_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let labels: Option<Vec<Label>> = Option::deserialize(deserializer)?;
    Ok(labels
        .unwrap_or_default()
        .into_iter()
        .map(|l| l.name)
        .collect())
}

/// Parameters of an issue/pull-request search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    pub q: String,
    pub sort: &'static str,
    pub order: &'static str,
    pub per_page: u32,
}

/// Result of creating a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelCreation {
    Created,
    AlreadyExists,
}

/// Result of removing a label from an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRemoval {
    Removed,
    /// The label was not on the item (or no longer exists).
    AlreadyAbsent,
}

/// Remote operations the labeler needs from the code-hosting platform.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Search open issues and pull requests.
    async fn search_issues(
        &self,
        params: &SearchParams,
    ) -> Result<Vec<Candidate>, GitHubError>;

    /// Look up a repository label; `None` when it does not exist.
    async fn get_label(&self, repo: &RepoRef, name: &str) -> Result<Option<Label>, GitHubError>;

    async fn create_label(
        &self,
        repo: &RepoRef,
        name: &str,
        color: &str,
    ) -> Result<LabelCreation, GitHubError>;

    async fn add_labels(
        &self,
        repo: &RepoRef,
        number: u64,
        labels: &[String],
    ) -> Result<(), GitHubError>;

    async fn remove_label(
        &self,
        repo: &RepoRef,
        number: u64,
        name: &str,
    ) -> Result<LabelRemoval, GitHubError>;

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str)
        -> Result<(), GitHubError>;

    async fn get_pull_request(&self, repo: &RepoRef, number: u64)
        -> Result<Candidate, GitHubError>;

    /// Raw contents of a file on the default branch; `None` when absent.
    async fn get_file_contents(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<Option<String>, GitHubError>;
}

/// Stops periodic sweeps for a repository.
#[async_trait]
pub trait Unsubscribe: Send + Sync {
    async fn unsubscribe(&self, repo: &RepoRef);
}
