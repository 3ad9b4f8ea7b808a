//! Fetching the settings document from GitHub.
//!
//! Lookup order:
//! 1. `.github/rfc-labeler.yml` in the repository itself;
//! 2. the same path in the owner's `.github` repository.
//!
//! A document may name a base with `_extends: repo` or `_extends: owner/repo`.
//! The base is loaded from that repository and keys in the local document
//! replace keys of the base. Only one level is followed.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::CONFIG_PATH;
use crate::github::{GitHubApi, GitHubError, RepoRef};

const EXTENDS_KEY: &str = "_extends";
const ORG_CONFIG_REPO: &str = ".github";

/// A settings document as found remotely, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub value: Value,
    /// Problems met while reading the document (parse errors, bad `_extends`).
    pub errors: Vec<String>,
}

/// Load the document governing `repo`; `None` when there is none at all.
pub async fn load_document(
    github: &dyn GitHubApi,
    repo: &RepoRef,
) -> Result<Option<Document>, GitHubError> {
    let mut document = match fetch(github, repo).await? {
        Some(doc) => doc,
        None => {
            let org_repo = RepoRef::new(repo.owner.clone(), ORG_CONFIG_REPO);
            if org_repo == *repo {
                return Ok(None);
            }
            match fetch(github, &org_repo).await? {
                Some(doc) => {
                    debug!(repository = %repo, "Using organisation-wide settings");
                    doc
                }
                None => return Ok(None),
            }
        }
    };

    let Some(target) = extends_target(&document.value) else {
        return Ok(Some(document));
    };

    let base_repo = match parse_extends(&target, &repo.owner) {
        Ok(base_repo) => base_repo,
        Err(message) => {
            document.errors.push(message);
            return Ok(Some(document));
        }
    };

    match fetch(github, &base_repo).await? {
        Some(base) => {
            debug!(repository = %repo, base = %base_repo, "Extending settings");
            document.errors.extend(base.errors);
            document.value = merge(base.value, document.value);
        }
        None => document.errors.push(format!(
            "extended settings {base_repo}:{CONFIG_PATH} not found"
        )),
    }

    Ok(Some(document))
}

async fn fetch(github: &dyn GitHubApi, repo: &RepoRef) -> Result<Option<Document>, GitHubError> {
    let Some(contents) = github.get_file_contents(repo, CONFIG_PATH).await? else {
        return Ok(None);
    };

    Ok(Some(match serde_yaml::from_str::<Value>(&contents) {
        Ok(value) => Document {
            value,
            errors: Vec::new(),
        },
        Err(e) => Document {
            value: Value::Null,
            errors: vec![format!("{CONFIG_PATH} is not valid YAML: {e}")],
        },
    }))
}

fn extends_target(doc: &Value) -> Option<String> {
    doc.as_mapping()?
        .get(EXTENDS_KEY)
        .map(|v| v.as_str().map_or_else(String::new, ToString::to_string))
}

fn parse_extends(target: &str, owner: &str) -> Result<RepoRef, String> {
    let target = target.trim();
    if target.is_empty() {
        return Err(format!(r#""{EXTENDS_KEY}" must be a repository name"#));
    }
    if target.contains('/') {
        target
            .parse()
            .map_err(|e| format!(r#""{EXTENDS_KEY}" {e}"#))
    } else {
        Ok(RepoRef::new(owner, target))
    }
}

/// Shallow merge: `local` keys replace `base` keys.
fn merge(base: Value, local: Value) -> Value {
    let (Value::Mapping(base), Value::Mapping(local)) = (base, local.clone()) else {
        return local;
    };
    let mut merged = Mapping::new();
    for (key, value) in base.into_iter().chain(local) {
        if key.as_str() != Some(EXTENDS_KEY) {
            merged.insert(key, value);
        }
    }
    Value::Mapping(merged)
}
