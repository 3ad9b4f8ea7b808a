//! Per-repository labeler configuration.
//!
//! Each invocation reads `.github/rfc-labeler.yml` from the target repository
//! (see [`loader`]) and resolves it into a fully defaulted [`LabelerConfig`].
//! Resolution never fails: invalid fields fall back to their defaults and are
//! reported back as messages for the caller to log.

pub mod loader;
mod schema;

use serde::Serialize;
use serde_yaml::Value;

use crate::github::RepoRef;

/// Path of the settings document inside a repository.
pub const CONFIG_PATH: &str = ".github/rfc-labeler.yml";

/// Hard ceiling on mark actions in a single sweep.
pub const MAX_ACTIONS_PER_RUN: u32 = 30;

/// Colour of the lifecycle label when the labeler creates it.
pub const TIMEOUT_LABEL_COLOR: &str = "A2AD00";

pub const DEFAULT_DAYS_UNTIL_TIMEOUT: f64 = 5.0;
pub const DEFAULT_TIMEOUT_LABEL: &str = "consensus";
pub const DEFAULT_MARK_COMMENT: &str = "Has this RFC reached consensus?\n\n\
The consensus time has come and has automatically been marked with the `consensus` label. \
This RFC should be changed, closed or merged.";

/// Resolved configuration for one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelerConfig {
    /// Days without activity before a pull request is marked.
    pub days_until_timeout: f64,
    /// When non-empty, only items carrying one of these labels are candidates.
    pub only_labels: Vec<String>,
    /// Items carrying any of these labels are never marked.
    pub exempt_labels: Vec<String>,
    /// Only unassigned items are candidates.
    pub exempt_assignees: bool,
    /// The lifecycle label, also the "already marked" marker.
    pub timeout_label: String,
    /// Comment posted when marking; `None` disables it.
    pub mark_comment: Option<String>,
    /// Comment posted when unmarking; `None` disables it.
    pub unmark_comment: Option<String>,
    /// Mark actions allowed per sweep, in `1..=30`.
    pub limit_per_run: u32,
    /// When false, intended mutations are logged instead of performed.
    pub perform: bool,
    pub repository: RepoRef,
}

impl LabelerConfig {
    /// Configuration with every field at its default.
    #[must_use]
    pub fn defaults(repository: RepoRef, dry_run: bool) -> Self {
        Self {
            days_until_timeout: DEFAULT_DAYS_UNTIL_TIMEOUT,
            only_labels: vec!["rfc".to_string()],
            exempt_labels: vec!["wip".to_string(), "elevated".to_string()],
            exempt_assignees: false,
            timeout_label: DEFAULT_TIMEOUT_LABEL.to_string(),
            mark_comment: Some(DEFAULT_MARK_COMMENT.to_string()),
            unmark_comment: None,
            limit_per_run: MAX_ACTIONS_PER_RUN,
            perform: !dry_run,
            repository,
        }
    }

    pub fn owner(&self) -> &str {
        &self.repository.owner
    }

    pub fn repo(&self) -> &str {
        &self.repository.name
    }
}

/// Outcome of resolving a settings document.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub config: LabelerConfig,
    /// Validation messages; non-fatal.
    pub errors: Vec<String>,
    /// No document exists for the repository. The caller should stop
    /// scheduling sweeps for it.
    pub missing: bool,
}

/// Resolve a raw settings document into a complete configuration.
///
/// `raw == None` means the repository has no settings document: the result
/// has `perform = false` and `missing = true`.
#[must_use]
pub fn resolve(raw: Option<&Value>, repository: &RepoRef, dry_run: bool) -> Resolution {
    let mut config = LabelerConfig::defaults(repository.clone(), dry_run);

    let Some(doc) = raw else {
        config.perform = false;
        return Resolution {
            config,
            errors: Vec::new(),
            missing: true,
        };
    };

    let errors = schema::apply(doc, &mut config);
    Resolution {
        config,
        errors,
        missing: false,
    }
}

/// Whether a `DRY_RUN` environment value switches the labeler to dry-run.
///
/// Any non-empty value counts, matching how the flag has always been read.
#[must_use]
pub fn dry_run_from_env(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}
