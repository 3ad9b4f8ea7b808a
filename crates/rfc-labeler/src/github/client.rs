//! GitHub REST client implementing [`GitHubApi`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{
    Candidate, GitHubApi, GitHubError, Label, LabelCreation, LabelRemoval, RepoRef, SearchParams,
};

const GITHUB_API_URL: &str = "https://api.github.com";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

/// GitHub API client authenticated with a token.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
}

impl GitHubClient {
    /// Create a client for api.github.com.
    pub fn new(token: &str) -> Result<Self, GitHubError> {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    /// Create a client against another API root (GitHub Enterprise, tests).
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("rfc-labeler/0.2"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn repo_url(&self, repo: &RepoRef, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.base_url, repo.owner, repo.name, tail
        )
    }

    /// Send an authenticated request and surface rate limiting.
    async fn send(&self, request: RequestBuilder) -> Result<Response, GitHubError> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
        ) && header_value(&response, "x-ratelimit-remaining") == Some(0)
        {
            let reset_in = rate_limit_reset(&response);
            warn!(reset_in = ?reset_in, "GitHub rate limit exhausted");
            return Err(GitHubError::RateLimited { reset_in });
        }

        Ok(response)
    }

    /// Turn a non-success response into an error, consuming the body.
    async fn api_error(response: Response) -> GitHubError {
        let status = response.status();
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        GitHubError::Api {
            status: status.as_u16(),
            message: body.message,
        }
    }
}

fn header_value(response: &Response, name: &str) -> Option<i64> {
    response
        .headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
}

fn rate_limit_reset(response: &Response) -> Duration {
    header_value(response, "x-ratelimit-reset")
        .map(|reset| {
            let now = chrono::Utc::now().timestamp();
            Duration::from_secs((reset - now).max(0) as u64)
        })
        .unwrap_or(Duration::from_secs(60))
}

#[async_trait]
impl GitHubApi for GitHubClient {
    #[instrument(skip(self, params), fields(q = %params.q))]
    async fn search_issues(&self, params: &SearchParams) -> Result<Vec<Candidate>, GitHubError> {
        let url = format!("{}/search/issues", self.base_url);
        let response = self.send(self.client.get(&url).query(params)).await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: SearchResponse = response.json().await?;
        debug!(count = body.items.len(), "Search returned items");
        Ok(body.items)
    }

    async fn get_label(&self, repo: &RepoRef, name: &str) -> Result<Option<Label>, GitHubError> {
        let url = self.repo_url(repo, &format!("labels/{}", urlencoding::encode(name)));
        let response = self.send(self.client.get(&url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn create_label(
        &self,
        repo: &RepoRef,
        name: &str,
        color: &str,
    ) -> Result<LabelCreation, GitHubError> {
        let url = self.repo_url(repo, "labels");
        let body = serde_json::json!({ "name": name, "color": color });
        let response = self.send(self.client.post(&url).json(&body)).await?;
        let status = response.status();

        if status.is_success() {
            return Ok(LabelCreation::Created);
        }

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body: ApiErrorBody = response.json().await.unwrap_or_default();
            if body
                .errors
                .iter()
                .any(|e| e.code.as_deref() == Some("already_exists"))
            {
                return Ok(LabelCreation::AlreadyExists);
            }
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message: body.message,
            });
        }

        Err(Self::api_error(response).await)
    }

    async fn add_labels(
        &self,
        repo: &RepoRef,
        number: u64,
        labels: &[String],
    ) -> Result<(), GitHubError> {
        if labels.is_empty() {
            return Ok(());
        }

        let url = self.repo_url(repo, &format!("issues/{number}/labels"));
        let body = serde_json::json!({ "labels": labels });
        let response = self.send(self.client.post(&url).json(&body)).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn remove_label(
        &self,
        repo: &RepoRef,
        number: u64,
        name: &str,
    ) -> Result<LabelRemoval, GitHubError> {
        let url = self.repo_url(
            repo,
            &format!("issues/{number}/labels/{}", urlencoding::encode(name)),
        );
        let response = self.send(self.client.delete(&url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(LabelRemoval::AlreadyAbsent),
            status if status.is_success() => Ok(LabelRemoval::Removed),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn create_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        let url = self.repo_url(repo, &format!("issues/{number}/comments"));
        let payload = serde_json::json!({ "body": body });
        let response = self.send(self.client.post(&url).json(&payload)).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn get_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Candidate, GitHubError> {
        let url = self.repo_url(repo, &format!("pulls/{number}"));
        let response = self.send(self.client.get(&url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(GitHubError::NotFound(format!("{repo}#{number}"))),
            status if status.is_success() => Ok(response.json().await?),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn get_file_contents(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<Option<String>, GitHubError> {
        let url = self.repo_url(repo, &format!("contents/{path}"));
        let response = self
            .send(self.client.get(&url).header(ACCEPT, RAW_MEDIA_TYPE))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.text().await?)),
            _ => Err(Self::api_error(response).await),
        }
    }
}
