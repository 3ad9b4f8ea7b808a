//! Errors raised by the GitHub REST layer.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub resource not found: {0}")]
    NotFound(String),

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limit exceeded, reset in {reset_in:?}")]
    RateLimited { reset_in: Duration },

    #[error("Failed to decode GitHub response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GitHubError {
    /// True when the remote answered 404 for the requested resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
