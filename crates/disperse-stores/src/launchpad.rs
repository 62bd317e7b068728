//! Launchpad milestones and product releases

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use disperse_core::error::RemoteError;
use disperse_core::traits::MilestoneTracker;
use disperse_core::version::Version;

use crate::error::{Result, StoreError};
use crate::http::ApiClient;

pub const LAUNCHPAD_API: &str = "https://api.launchpad.net/1.0";
const SERVICE: &str = "launchpad";

/// OAuth access token for the Launchpad API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchpadCredentials {
    pub consumer_key: String,
    pub token: String,
    pub secret: String,
}

impl LaunchpadCredentials {
    /// `LAUNCHPAD_TOKEN` and `LAUNCHPAD_SECRET`, with an optional
    /// `LAUNCHPAD_CONSUMER_KEY`
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("LAUNCHPAD_TOKEN").ok()?;
        let secret = std::env::var("LAUNCHPAD_SECRET").ok()?;
        let consumer_key =
            std::env::var("LAUNCHPAD_CONSUMER_KEY").unwrap_or_else(|_| "disperse".to_string());
        Some(Self {
            consumer_key,
            token,
            secret,
        })
    }

    /// PLAINTEXT-signed OAuth 1.0 header
    fn authorization(&self) -> String {
        let nonce: u64 = rand::thread_rng().gen();
        format!(
            "OAuth realm=\"https://api.launchpad.net/\", oauth_consumer_key=\"{}\", \
             oauth_token=\"{}\", oauth_signature_method=\"PLAINTEXT\", \
             oauth_signature=\"%26{}\", oauth_timestamp=\"{}\", oauth_nonce=\"{nonce}\", \
             oauth_version=\"1.0\"",
            self.consumer_key,
            self.token,
            self.secret,
            Utc::now().timestamp()
        )
    }
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    entries: Vec<T>,
    next_collection_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    name: String,
    self_link: String,
    #[serde(default)]
    active: bool,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    development_focus_link: String,
}

#[derive(Debug, Deserialize)]
struct Milestone {
    self_link: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    version: String,
}

/// Milestones and releases of one Launchpad project
#[derive(Debug, Clone)]
pub struct LaunchpadClient {
    api: ApiClient,
    project: String,
    series: Option<String>,
    credentials: Option<LaunchpadCredentials>,
}

impl LaunchpadClient {
    pub fn new(project: impl Into<String>, series: Option<String>) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(LAUNCHPAD_API)?,
            project: project.into(),
            series,
            credentials: LaunchpadCredentials::from_env(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api.set_base_url(base_url);
        self
    }

    pub fn with_credentials(mut self, credentials: Option<LaunchpadCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .api
            .request(method, path)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.credentials {
            Some(credentials) => {
                request.header(reqwest::header::AUTHORIZATION, credentials.authorization())
            }
            None => request,
        }
    }

    /// Named operation on an entry; writes need credentials
    async fn invoke(&self, link: &str, params: &[(&str, String)]) -> Result<()> {
        if self.credentials.is_none() {
            return Err(StoreError::AuthenticationFailed(
                "LAUNCHPAD_TOKEN and LAUNCHPAD_SECRET are not set".to_string(),
            ));
        }
        self.api
            .send(self.request(Method::POST, link).form(params))
            .await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.api.json(self.request(Method::GET, path)).await
    }

    /// Every entry of a collection, following pagination links
    async fn collect<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut page: Collection<T> = self.get(path).await?;
        let mut entries = std::mem::take(&mut page.entries);
        while let Some(next) = page.next_collection_link.take() {
            page = self.get(&next).await?;
            entries.append(&mut page.entries);
        }
        Ok(entries)
    }

    /// Entry that may not exist
    async fn find<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path).await {
            Ok(entry) => Ok(Some(entry)),
            Err(StoreError::ApiError { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The configured series, the only series, the single active series
    /// matching `version`, or the development focus
    async fn series_link(&self, version: &Version) -> Result<String> {
        let series: Vec<Series> = self.collect(&format!("{}/series", self.project)).await?;
        if let Some(name) = &self.series {
            return series
                .into_iter()
                .find(|s| &s.name == name)
                .map(|s| s.self_link)
                .ok_or_else(|| {
                    StoreError::ConfigurationError(format!(
                        "no series {name} in Launchpad project {}",
                        self.project
                    ))
                });
        }
        let version = version.to_string();
        let mut candidates: Vec<Series> = if series.len() == 1 {
            series
        } else {
            series
                .into_iter()
                .filter(|s| s.active && version.starts_with(&s.name))
                .collect()
        };
        if candidates.len() == 1 {
            return Ok(candidates.remove(0).self_link);
        }
        warn!(project = %self.project, "no single matching series, using development focus");
        let project: ProjectEntry = self.get(&self.project).await?;
        Ok(project.development_focus_link)
    }

    async fn milestone(&self, version: &Version) -> Result<Option<Milestone>> {
        self.find(&format!("{}/+milestone/{version}", self.project))
            .await
    }

    async fn new_milestone(&self, version: &Version) -> Result<()> {
        let series = self.series_link(version).await?;
        self.invoke(
            &series,
            &[
                ("ws.op", "newMilestone".to_string()),
                ("name", version.to_string()),
                ("date_targeted", Utc::now().date_naive().to_string()),
            ],
        )
        .await?;
        info!(project = %self.project, version = %version, "created Launchpad milestone");
        Ok(())
    }

    async fn release(&self, version: &Version, notes: Option<&str>) -> Result<()> {
        let releases: Vec<Release> = self.collect(&format!("{}/releases", self.project)).await?;
        let wanted = version.to_string();
        if releases.iter().any(|r| r.version == wanted) {
            debug!(project = %self.project, version = %wanted, "release already exists");
            return Ok(());
        }

        let milestone = match self.milestone(version).await? {
            Some(milestone) => milestone,
            None => {
                self.new_milestone(version).await?;
                self.milestone(version).await?.ok_or_else(|| {
                    StoreError::InvalidResponse(format!("milestone {version} missing after creation"))
                })?
            }
        };

        let mut params = vec![
            ("ws.op", "createProductRelease".to_string()),
            ("date_released", Utc::now().to_rfc3339()),
        ];
        if let Some(notes) = notes {
            params.push(("release_notes", notes.to_string()));
        }
        self.invoke(&milestone.self_link, &params).await?;
        info!(project = %self.project, version = %version, "created Launchpad release");
        Ok(())
    }
}

#[async_trait]
impl MilestoneTracker for LaunchpadClient {
    fn name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip(self, notes), fields(project = %self.project))]
    async fn ensure_release(
        &self,
        version: &Version,
        notes: Option<&str>,
    ) -> std::result::Result<(), RemoteError> {
        self.release(version, notes)
            .await
            .map_err(|e| e.into_remote(SERVICE))
    }

    #[instrument(skip(self), fields(project = %self.project))]
    async fn create_milestone(&self, version: &Version) -> std::result::Result<(), RemoteError> {
        if self
            .milestone(version)
            .await
            .map_err(|e| e.into_remote(SERVICE))?
            .is_some()
        {
            return Ok(());
        }
        self.new_milestone(version)
            .await
            .map_err(|e| e.into_remote(SERVICE))
    }
}
