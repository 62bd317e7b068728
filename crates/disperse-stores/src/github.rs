//! GitHub: CI check-runs and release entries

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use disperse_core::config::parse_github_url;
use disperse_core::error::RemoteError;
use disperse_core::traits::{CiProvider, CiStatus, ReleaseHost};
use disperse_core::version::Version;

use crate::error::{Result, StoreError};
use crate::http::ApiClient;

pub const GITHUB_API: &str = "https://api.github.com";
const SERVICE: &str = "github";

/// Client for one GitHub repository
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api: ApiClient,
    owner: String,
    repo: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckRuns {
    check_runs: Vec<CheckRun>,
}

#[derive(Debug, Deserialize)]
struct CheckRun {
    name: String,
    status: String,
    conclusion: Option<String>,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRelease {
    html_url: String,
}

impl GitHubClient {
    /// Client authenticated with `GITHUB_TOKEN`, when set
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(GITHUB_API)?,
            owner: owner.into(),
            repo: repo.into(),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let (owner, repo) = parse_github_url(url).ok_or_else(|| {
            StoreError::ConfigurationError(format!("not a GitHub repository URL: {url}"))
        })?;
        Self::new(owner, repo)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api.set_base_url(base_url);
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut endpoint = format!("repos/{}/{}", self.owner, self.repo);
        if !path.is_empty() {
            endpoint.push('/');
            endpoint.push_str(path);
        }
        let request = self
            .api
            .request(method, &endpoint)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_runs(&self, reference: &str) -> Result<Vec<CheckRun>> {
        let runs: CheckRuns = self
            .api
            .json(self.request(
                Method::GET,
                &format!("commits/{reference}/check-runs?per_page=100"),
            ))
            .await?;
        Ok(runs.check_runs)
    }

    async fn repository(&self) -> Result<Repository> {
        self.api.json(self.request(Method::GET, "")).await
    }

    async fn post_release(&self, tag: &str, version: &Version, notes: Option<&str>) -> Result<String> {
        if self.token.is_none() {
            return Err(StoreError::AuthenticationFailed(
                "GITHUB_TOKEN is not set".to_string(),
            ));
        }
        let body = json!({
            "tag_name": tag,
            "name": version.to_string(),
            "body": notes.map(str::to_string).unwrap_or_else(|| format!("Release {version}.")),
        });
        let created: CreatedRelease = self
            .api
            .json(self.request(Method::POST, "releases").json(&body))
            .await?;
        Ok(created.html_url)
    }
}

/// Any failed run fails the revision; otherwise any unfinished run keeps it
/// pending. A revision without check runs has nothing blocking it.
fn summarize(runs: &[CheckRun]) -> CiStatus {
    let describe = |run: &CheckRun, state: &str| match &run.html_url {
        Some(url) => format!("{} {state} ({url})", run.name),
        None => format!("{} {state}", run.name),
    };
    let failed = runs.iter().find(|run| {
        matches!(run.conclusion.as_deref(), Some(c) if !matches!(c, "success" | "skipped" | "neutral"))
    });
    if let Some(run) = failed {
        return CiStatus::Failing(describe(run, run.conclusion.as_deref().unwrap_or("failed")));
    }
    if let Some(run) = runs.iter().find(|run| run.conclusion.is_none()) {
        return CiStatus::Pending(describe(run, &run.status));
    }
    CiStatus::Passing
}

#[async_trait]
impl CiProvider for GitHubClient {
    fn name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip(self), fields(repo = %format!("{}/{}", self.owner, self.repo)))]
    async fn status(&self, reference: &str) -> std::result::Result<CiStatus, RemoteError> {
        let runs = self
            .check_runs(reference)
            .await
            .map_err(|e| e.into_remote(SERVICE))?;
        let status = summarize(&runs);
        if !matches!(status, CiStatus::Passing) {
            warn!(reference, ?status, "CI not green");
        }
        Ok(status)
    }

    async fn default_branch(&self) -> std::result::Result<String, RemoteError> {
        let repository = self
            .repository()
            .await
            .map_err(|e| e.into_remote(SERVICE))?;
        Ok(repository.default_branch)
    }
}

#[async_trait]
impl ReleaseHost for GitHubClient {
    fn name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip(self, notes), fields(repo = %format!("{}/{}", self.owner, self.repo)))]
    async fn create_release(
        &self,
        tag: &str,
        version: &Version,
        notes: Option<&str>,
    ) -> std::result::Result<String, RemoteError> {
        let url = self
            .post_release(tag, version, notes)
            .await
            .map_err(|e| e.into_remote(SERVICE))?;
        info!(tag, url = %url, "created GitHub release");
        Ok(url)
    }
}
