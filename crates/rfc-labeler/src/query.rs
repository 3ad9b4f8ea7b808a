//! Search predicate for finding pull requests that timed out.

use chrono::{DateTime, Utc};

use crate::config::LabelerConfig;
use crate::github::SearchParams;

/// Results requested per sweep; also the hard per-run action ceiling.
pub const SEARCH_PAGE_SIZE: u32 = 30;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Last-update time before which an item counts as inactive.
///
/// Never earlier than the Unix epoch; GitHub rejects such qualifiers.
#[must_use]
pub fn cutoff(days_until_timeout: f64, now: DateTime<Utc>) -> DateTime<Utc> {
    let ttl_ms = (days_until_timeout * MILLIS_PER_DAY) as i64;
    let millis = now.timestamp_millis().saturating_sub(ttl_ms).max(0);
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Build the search query for `config` as of `now`.
#[must_use]
pub fn build_stale_query(config: &LabelerConfig, now: DateTime<Utc>) -> String {
    let timestamp = cutoff(config.days_until_timeout, now).format("%Y-%m-%dT%H:%M:%S");

    let mut parts = vec![
        format!("repo:{}", config.repository),
        "is:open".to_string(),
        format!("updated:<{timestamp}"),
    ];

    parts.extend(
        std::iter::once(&config.timeout_label)
            .chain(&config.exempt_labels)
            .map(|label| format!("-label:{}", quote(label))),
    );

    if !config.only_labels.is_empty() {
        let any_of: Vec<String> = config.only_labels.iter().map(|l| quote(l)).collect();
        parts.push(format!("label:{}", any_of.join(",")));
    }

    parts.push("is:pr".to_string());

    if config.exempt_assignees {
        parts.push("no:assignee".to_string());
    }

    parts.join(" ")
}

/// Full search request: newest updates first, one page.
#[must_use]
pub fn search_params(config: &LabelerConfig, now: DateTime<Utc>) -> SearchParams {
    SearchParams {
        q: build_stale_query(config, now),
        sort: "updated",
        order: "desc",
        per_page: SEARCH_PAGE_SIZE,
    }
}

fn quote(label: &str) -> String {
    format!("\"{label}\"")
}
