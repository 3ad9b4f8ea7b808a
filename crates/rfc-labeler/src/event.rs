//! Activity webhooks that can resume a stale pull request.
//!
//! GitHub delivers four event types that count as activity. Their payloads
//! carry the item either as `pull_request` or as `issue`; [`Subject`] keeps
//! which one arrived so the rest of the flow never has to guess.

use serde::Deserialize;
use thiserror::Error;

use crate::github::{ItemState, Label, RepoRef};

/// Webhook event types that trigger the reversal flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    IssueComment,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
}

impl EventKind {
    /// Map an `X-GitHub-Event` header value; `None` for other events.
    #[must_use]
    pub fn from_header(name: &str) -> Option<Self> {
        match name {
            "issue_comment" => Some(Self::IssueComment),
            "pull_request" => Some(Self::PullRequest),
            "pull_request_review" => Some(Self::PullRequestReview),
            "pull_request_review_comment" => Some(Self::PullRequestReviewComment),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IssueComment => "issue_comment",
            Self::PullRequest => "pull_request",
            Self::PullRequestReview => "pull_request_review",
            Self::PullRequestReviewComment => "pull_request_review_comment",
        }
    }
}

/// The item an event is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub number: u64,
    pub state: ItemState,
    /// `None` when the payload carried no label data.
    pub labels: Option<Vec<String>>,
}

/// Shape in which the item arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    PullRequest(Item),
    Issue(Item),
}

impl Subject {
    #[must_use]
    pub fn item(&self) -> &Item {
        match self {
            Self::PullRequest(item) | Self::Issue(item) => item,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PullRequest(_) => "pull_request",
            Self::Issue(_) => "issue",
        }
    }
}

/// Sender of a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sender {
    pub login: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// A parsed activity event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub kind: EventKind,
    pub action: Option<String>,
    pub repository: RepoRef,
    pub subject: Subject,
    pub sender: Option<Sender>,
    /// Label attached by a `labeled`/`unlabeled` action.
    pub label: Option<String>,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid webhook payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload has neither a pull_request nor an issue")]
    MissingSubject,
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    pull_request: Option<WireItem>,
    #[serde(default)]
    issue: Option<WireItem>,
    repository: WireRepository,
    #[serde(default)]
    sender: Option<Sender>,
    #[serde(default)]
    label: Option<Label>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    number: u64,
    state: ItemState,
    #[serde(default)]
    labels: Option<Vec<Label>>,
}

#[derive(Debug, Deserialize)]
struct WireRepository {
    name: String,
    owner: WireOwner,
}

#[derive(Debug, Deserialize)]
struct WireOwner {
    login: String,
}

impl From<WireItem> for Item {
    fn from(wire: WireItem) -> Self {
        Self {
            number: wire.number,
            state: wire.state,
            labels: wire
                .labels
                .map(|labels| labels.into_iter().map(|l| l.name).collect()),
        }
    }
}

impl ActivityEvent {
    /// Parse a webhook body for event `kind`.
    pub fn parse(kind: EventKind, body: &[u8]) -> Result<Self, EventError> {
        let wire: WirePayload = serde_json::from_slice(body)?;

        let subject = match (wire.pull_request, wire.issue) {
            (Some(pr), _) => Subject::PullRequest(pr.into()),
            (None, Some(issue)) => Subject::Issue(issue.into()),
            (None, None) => return Err(EventError::MissingSubject),
        };

        Ok(Self {
            kind,
            action: wire.action,
            repository: RepoRef::new(wire.repository.owner.login, wire.repository.name),
            subject,
            sender: wire.sender,
            label: wire.label.map(|l| l.name),
        })
    }

    /// Whether an automated account caused the event.
    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.sender.as_ref().is_some_and(|s| s.kind == "Bot")
    }

    /// Name of the label applied by this event, if it is a `labeled` action.
    #[must_use]
    pub fn applied_label(&self) -> Option<&str> {
        match self.action.as_deref() {
            Some("labeled") => self.label.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        self.subject.item().number
    }
}
