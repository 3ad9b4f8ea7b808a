//! In-memory `GitHubApi` that records every call.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use super::{
    Candidate, GitHubApi, GitHubError, ItemState, Label, LabelCreation, LabelRemoval, RepoRef,
    SearchParams, Unsubscribe,
};

/// One remote call, as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Search(String),
    GetLabel(String),
    CreateLabel(String, String),
    AddLabels(u64, Vec<String>),
    RemoveLabel(u64, String),
    Comment(u64, String),
    GetPull(u64),
    GetFile(String, String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateLabel(..) | Self::AddLabels(..) | Self::RemoveLabel(..) | Self::Comment(..)
        )
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    /// Items keyed by number; search returns them in insertion order.
    items: BTreeMap<u64, Candidate>,
    order: Vec<u64>,
    repo_labels: BTreeSet<String>,
    files: HashMap<(String, String), String>,
    failing_adds: BTreeSet<u64>,
    unsubscribed: Vec<RepoRef>,
    /// Search ignores `-label` exclusions, like an index that has not caught up.
    stale_index: bool,
}

#[derive(Default)]
pub struct FakeGitHub {
    state: Mutex<State>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, number: u64, state: ItemState, labels: &[&str]) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.items.insert(
                number,
                Candidate {
                    number,
                    state,
                    labels: labels.iter().map(ToString::to_string).collect(),
                },
            );
            s.order.push(number);
        }
        self
    }

    pub fn with_repo_label(self, name: &str) -> Self {
        self.state.lock().unwrap().repo_labels.insert(name.to_string());
        self
    }

    pub fn with_file(self, repo: &RepoRef, path: &str, contents: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert((repo.to_string(), path.to_string()), contents.to_string());
        self
    }

    pub fn failing_add_for(self, number: u64) -> Self {
        self.state.lock().unwrap().failing_adds.insert(number);
        self
    }

    /// Let search return items whose labels the query excludes.
    pub fn with_stale_index(self) -> Self {
        self.state.lock().unwrap().stale_index = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn labels_of(&self, number: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .items
            .get(&number)
            .map(|i| i.labels.clone())
            .unwrap_or_default()
    }

    pub fn unsubscribed(&self) -> Vec<RepoRef> {
        self.state.lock().unwrap().unsubscribed.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

/// Label names from the `-label:"..."` terms of a search query.
fn excluded_labels(q: &str) -> Vec<String> {
    q.split(r#"-label:""#)
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(ToString::to_string)
        .collect()
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn search_issues(&self, params: &SearchParams) -> Result<Vec<Candidate>, GitHubError> {
        self.record(Call::Search(params.q.clone()));
        let s = self.state.lock().unwrap();
        let excluded = if s.stale_index {
            Vec::new()
        } else {
            excluded_labels(&params.q)
        };
        Ok(s.order
            .iter()
            .filter_map(|n| s.items.get(n))
            .filter(|item| !item.labels.iter().any(|l| excluded.contains(l)))
            .take(params.per_page as usize)
            .cloned()
            .collect())
    }

    async fn get_label(&self, _repo: &RepoRef, name: &str) -> Result<Option<Label>, GitHubError> {
        self.record(Call::GetLabel(name.to_string()));
        let s = self.state.lock().unwrap();
        Ok(s.repo_labels.contains(name).then(|| Label {
            name: name.to_string(),
            color: None,
        }))
    }

    async fn create_label(
        &self,
        _repo: &RepoRef,
        name: &str,
        color: &str,
    ) -> Result<LabelCreation, GitHubError> {
        self.record(Call::CreateLabel(name.to_string(), color.to_string()));
        let inserted = self.state.lock().unwrap().repo_labels.insert(name.to_string());
        Ok(if inserted {
            LabelCreation::Created
        } else {
            LabelCreation::AlreadyExists
        })
    }

    async fn add_labels(
        &self,
        _repo: &RepoRef,
        number: u64,
        labels: &[String],
    ) -> Result<(), GitHubError> {
        self.record(Call::AddLabels(number, labels.to_vec()));
        let mut s = self.state.lock().unwrap();
        if s.failing_adds.contains(&number) {
            return Err(GitHubError::Api {
                status: 500,
                message: "add failed".to_string(),
            });
        }
        if let Some(item) = s.items.get_mut(&number) {
            for label in labels {
                if !item.labels.contains(label) {
                    item.labels.push(label.clone());
                }
            }
        }
        Ok(())
    }

    async fn remove_label(
        &self,
        _repo: &RepoRef,
        number: u64,
        name: &str,
    ) -> Result<LabelRemoval, GitHubError> {
        self.record(Call::RemoveLabel(number, name.to_string()));
        let mut s = self.state.lock().unwrap();
        let Some(item) = s.items.get_mut(&number) else {
            return Ok(LabelRemoval::AlreadyAbsent);
        };
        let before = item.labels.len();
        item.labels.retain(|l| l != name);
        Ok(if item.labels.len() < before {
            LabelRemoval::Removed
        } else {
            LabelRemoval::AlreadyAbsent
        })
    }

    async fn create_comment(
        &self,
        _repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        self.record(Call::Comment(number, body.to_string()));
        Ok(())
    }

    async fn get_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Candidate, GitHubError> {
        self.record(Call::GetPull(number));
        self.state
            .lock()
            .unwrap()
            .items
            .get(&number)
            .cloned()
            .ok_or_else(|| GitHubError::NotFound(format!("{repo}#{number}")))
    }

    async fn get_file_contents(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<Option<String>, GitHubError> {
        self.record(Call::GetFile(repo.to_string(), path.to_string()));
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .get(&(repo.to_string(), path.to_string()))
            .cloned())
    }
}

#[async_trait]
impl Unsubscribe for FakeGitHub {
    async fn unsubscribe(&self, repo: &RepoRef) {
        self.state.lock().unwrap().unsubscribed.push(repo.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_excluded_labels_from_query() {
        let q = r#"repo:acme/rfcs is:open updated:<2024-03-10T12:00:00 -label:"consensus" -label:"wip" label:"rfc" is:pr"#;
        assert_eq!(excluded_labels(q), vec!["consensus", "wip"]);
    }
}
