//! Projects a PyPI user maintains

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};
use url::Url;

use disperse_core::error::RemoteError;
use disperse_core::retry::{retry, RetryStrategyConfig};
use disperse_core::traits::{ProjectRef, ProjectSource};

use crate::error::{Result, StoreError};
use crate::http::ApiClient;

pub const PYPI_URL: &str = "https://pypi.org";
const SERVICE: &str = "pypi";

/// Scalar string values of an XML-RPC response, in document order
static XMLRPC_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<value>\s*(?:<string>([^<]*)</string>|([^<\s][^<]*))\s*</value>")
        .expect("Invalid regex")
});

#[derive(Debug, Deserialize)]
struct ProjectJson {
    info: ProjectInfo,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    #[serde(default)]
    project_urls: Option<BTreeMap<String, String>>,
    #[serde(default)]
    home_page: Option<String>,
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn user_packages_call(user: &str) -> String {
    format!(
        "<?xml version='1.0'?>\n<methodCall><methodName>user_packages</methodName>\
         <params><param><value><string>{}</string></value></param></params></methodCall>",
        xml_escape(user)
    )
}

/// Package names from a `user_packages` response of `[role, package]` pairs
fn parse_user_packages(body: &str) -> Result<Vec<String>> {
    if body.contains("<fault>") {
        return Err(StoreError::InvalidResponse(format!(
            "XML-RPC fault: {}",
            body.trim()
        )));
    }
    if !body.contains("<methodResponse>") {
        return Err(StoreError::InvalidResponse(
            "not an XML-RPC response".to_string(),
        ));
    }
    let values: Vec<String> = XMLRPC_STRING
        .captures_iter(body)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| xml_unescape(m.as_str().trim()))
        .collect();
    let mut packages: Vec<String> = values.chunks(2).filter_map(|pair| pair.get(1).cloned()).collect();
    packages.dedup();
    Ok(packages)
}

/// `Repository` entry, or any GitHub URL naming an owner and repository
fn repository_url(info: &ProjectInfo) -> Option<String> {
    let urls = info.project_urls.clone().unwrap_or_default();
    if let Some(url) = urls.get("Repository") {
        return Some(url.clone());
    }
    urls.values()
        .chain(info.home_page.iter())
        .find(|url| {
            Url::parse(url).is_ok_and(|parsed| {
                parsed.host_str() == Some("github.com")
                    && parsed.path().trim_matches('/').matches('/').count() == 1
            })
        })
        .cloned()
}

/// Projects maintained by a PyPI account
pub struct PypiSource {
    api: ApiClient,
    user: String,
    retry: RetryStrategyConfig,
}

impl PypiSource {
    pub fn new(user: impl Into<String>, retry: RetryStrategyConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(PYPI_URL)?,
            user: user.into(),
            retry,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api.set_base_url(base_url);
        self
    }

    async fn user_packages(&self) -> Result<Vec<String>> {
        let request = self
            .api
            .request(Method::POST, "pypi")
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(user_packages_call(&self.user));
        let body = self.api.send(request).await?.text().await?;
        parse_user_packages(&body)
    }

    async fn project_info(&self, package: &str) -> Result<ProjectInfo> {
        let project: ProjectJson = self
            .api
            .json(self.api.request(Method::GET, &format!("pypi/{package}/json")))
            .await?;
        Ok(project.info)
    }
}

#[async_trait]
impl ProjectSource for PypiSource {
    fn name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip(self), fields(user = %self.user))]
    async fn list_projects(&self) -> std::result::Result<Vec<ProjectRef>, RemoteError> {
        let packages = retry(&self.retry, "pypi user_packages", || async {
            self.user_packages().await.map_err(|e| e.into_remote(SERVICE))
        })
        .await?;
        info!(count = packages.len(), "found PyPI packages");

        let mut projects = Vec::new();
        for package in packages {
            let info = retry(&self.retry, "pypi project", || async {
                self.project_info(&package)
                    .await
                    .map_err(|e| e.into_remote(SERVICE))
            })
            .await;
            match info {
                Ok(info) => match repository_url(&info) {
                    Some(location) => projects.push(ProjectRef {
                        name: package,
                        source: SERVICE.to_string(),
                        location: Some(location),
                    }),
                    None => debug!(package = %package, "no repository URL, skipping"),
                },
                Err(e) => warn!(package = %package, error = %e, "unable to look up project"),
            }
        }
        Ok(projects)
    }
}
