//! Crates a crates.io user owns

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use disperse_core::error::RemoteError;
use disperse_core::retry::{retry, RetryStrategyConfig};
use disperse_core::traits::{ProjectRef, ProjectSource};

use crate::error::Result;
use crate::http::ApiClient;

pub const CRATES_IO_URL: &str = "https://crates.io";
const SERVICE: &str = "crates.io";
const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: User,
}

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct CratesPage {
    crates: Vec<Crate>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Crate {
    name: String,
    repository: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    total: usize,
}

pub struct CratesIoSource {
    api: ApiClient,
    user: String,
    retry: RetryStrategyConfig,
}

impl CratesIoSource {
    pub fn new(user: impl Into<String>, retry: RetryStrategyConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(CRATES_IO_URL)?,
            user: user.into(),
            retry,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api.set_base_url(base_url);
        self
    }

    async fn user_id(&self) -> Result<u64> {
        let response: UserResponse = self
            .api
            .json(self.api.request(Method::GET, &format!("api/v1/users/{}", self.user)))
            .await?;
        Ok(response.user.id)
    }

    async fn page(&self, user_id: u64, page: usize) -> Result<CratesPage> {
        self.api
            .json(self.api.request(
                Method::GET,
                &format!("api/v1/crates?user_id={user_id}&per_page={PER_PAGE}&page={page}"),
            ))
            .await
    }

    async fn owned_crates(&self) -> std::result::Result<Vec<Crate>, RemoteError> {
        let user_id = retry(&self.retry, "crates.io user", || async {
            self.user_id().await.map_err(|e| e.into_remote(SERVICE))
        })
        .await?;

        let mut crates = Vec::new();
        let mut page = 1;
        loop {
            let mut listing = retry(&self.retry, "crates.io crates", || async {
                self.page(user_id, page)
                    .await
                    .map_err(|e| e.into_remote(SERVICE))
            })
            .await?;
            let fetched = listing.crates.len();
            crates.append(&mut listing.crates);
            if fetched == 0 || crates.len() >= listing.meta.total {
                break;
            }
            page += 1;
        }
        Ok(crates)
    }
}

#[async_trait]
impl ProjectSource for CratesIoSource {
    fn name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip(self), fields(user = %self.user))]
    async fn list_projects(&self) -> std::result::Result<Vec<ProjectRef>, RemoteError> {
        let crates = self.owned_crates().await?;
        info!(count = crates.len(), "found owned crates");
        Ok(crates
            .into_iter()
            .filter_map(|c| match c.repository {
                Some(repository) => Some(ProjectRef {
                    name: c.name,
                    source: SERVICE.to_string(),
                    location: Some(repository),
                }),
                None => {
                    debug!(krate = %c.name, "no repository URL, skipping");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockServer, Reply};

    #[tokio::test]
    async fn test_list_projects_pages() {
        let server = MockServer::start(vec![
            (
                "GET /api/v1/users/jelmer",
                vec![Reply::json(200, r#"{"user": {"id": 42, "login": "jelmer"}}"#)],
            ),
            (
                "GET /api/v1/crates?user_id=42&per_page=100&page=1",
                vec![Reply::json(
                    200,
                    r#"{"crates": [
                        {"name": "disperse", "repository": "https://github.com/jelmer/disperse"},
                        {"name": "private-thing", "repository": null}
                    ], "meta": {"total": 3}}"#,
                )],
            ),
            (
                "GET /api/v1/crates?user_id=42&per_page=100&page=2",
                vec![Reply::json(
                    200,
                    r#"{"crates": [{"name": "breezyshim", "repository": "https://github.com/breezy-team/breezyshim"}], "meta": {"total": 3}}"#,
                )],
            ),
        ]);
        let source = CratesIoSource::new("jelmer", RetryStrategyConfig::immediate(1))
            .unwrap()
            .with_base_url(&server.url);
        let projects = source.list_projects().await.unwrap();
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["disperse", "breezyshim"]);
        assert!(projects.iter().all(|p| p.source == "crates.io"));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let server = MockServer::start(vec![(
            "GET /api/v1/users/nobody",
            vec![Reply::json(404, r#"{"errors": [{"detail": "Not Found"}]}"#)],
        )]);
        let source = CratesIoSource::new("nobody", RetryStrategyConfig::immediate(3))
            .unwrap()
            .with_base_url(&server.url);
        let err = source.list_projects().await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert_eq!(server.requests().len(), 1);
    }
}
