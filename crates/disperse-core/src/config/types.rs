//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::retry::RetryStrategyConfig;
use crate::types::GateCheck;

/// Repository-local project configuration (`disperse.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// Project name, overriding the manifest
    pub name: Option<String>,

    /// Tag template with a single `$VERSION` placeholder
    pub tag_name: String,

    /// News file with `<version>\t<date|UNRELEASED>` entries
    pub news_file: Option<PathBuf>,

    /// Rules for rewriting versions in arbitrary files
    pub update_version: Vec<UpdateVersionRule>,

    /// Manpages whose `.TH` line is stamped
    pub update_manpage: Vec<String>,

    /// Command run to verify a release
    pub verify_command: Option<String>,

    /// Command run before verification
    pub pre_dist_command: Option<String>,

    /// Minimum idle period before releasing, in days
    #[serde(alias = "release-timeout-days")]
    pub timeout_days: Option<u32>,

    /// Upper bound on waiting for CI, in seconds
    pub ci_timeout: u64,

    /// Delay between CI queries while waiting on the release commit, in seconds
    pub ci_poll_interval: u64,

    /// Upper bound on a whole release attempt, in seconds
    pub release_timeout: u64,

    #[serde(alias = "twine-upload-skip")]
    pub skip_twine_upload: bool,

    pub skip_crates_publish: bool,

    /// Registry whose upload failure blocks tagging
    pub primary_registry: Option<String>,

    /// `scp` destinations receiving the built source artifacts
    pub tarball_location: Vec<String>,

    /// Gate checks that are never evaluated
    pub disabled_checks: Vec<GateCheck>,

    pub github: Option<GitHubConfig>,

    pub launchpad: Option<LaunchpadConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            tag_name: "v$VERSION".to_string(),
            news_file: None,
            update_version: Vec::new(),
            update_manpage: Vec::new(),
            verify_command: None,
            pre_dist_command: None,
            timeout_days: None,
            ci_timeout: 7200,
            ci_poll_interval: 30,
            release_timeout: 3600,
            skip_twine_upload: false,
            skip_crates_publish: false,
            primary_registry: None,
            tarball_location: Vec::new(),
            disabled_checks: Vec::new(),
            github: None,
            launchpad: None,
        }
    }
}

impl ProjectConfig {
    /// Whether uploads to `registry` are disabled
    pub fn skips_registry(&self, registry: &str) -> bool {
        match registry {
            "pypi" => self.skip_twine_upload,
            "crates.io" => self.skip_crates_publish,
            _ => false,
        }
    }

    pub fn is_check_disabled(&self, check: GateCheck) -> bool {
        self.disabled_checks.contains(&check)
    }

    pub fn is_primary(&self, registry: &str) -> bool {
        self.primary_registry.as_deref() == Some(registry)
    }
}

/// One file-rewrite rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdateVersionRule {
    /// File to rewrite, relative to the project root
    pub path: PathBuf,

    /// Regex selecting lines to replace; derived from `new-line` when absent
    #[serde(default, rename = "match")]
    pub match_pattern: Option<String>,

    /// Replacement line with version variables such as `$VERSION`
    pub new_line: String,
}

/// GitHub hosting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// Repository URL, e.g. `https://github.com/owner/repo`
    pub url: String,

    /// Branch whose CI status gates the release
    #[serde(default)]
    pub branch: Option<String>,
}

impl GitHubConfig {
    /// `(owner, repo)` parsed from the URL
    pub fn owner_repo(&self) -> Option<(String, String)> {
        parse_github_url(&self.url)
    }
}

/// Extract `(owner, repo)` from a GitHub URL
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .split_once("github.com")?
        .1
        .trim_start_matches([':', '/']);
    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    let owner = parts.next()?;
    let repo = parts.next()?;
    Some((owner.to_string(), repo.to_string()))
}

/// Launchpad configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LaunchpadConfig {
    pub project: String,

    #[serde(default)]
    pub series: Option<String>,
}

/// Operator configuration (`~/.config/disperse/disperse.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserConfig {
    pub pypi: RegistryUser,

    #[serde(rename = "crates.io")]
    pub crates_io: RegistryUser,

    pub repositories: RepositoriesConfig,

    pub discover: DiscoverConfig,

    pub retry: RetryStrategyConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryUser {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoriesConfig {
    /// Repository URLs released in discover mode besides registry listings
    pub owned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverConfig {
    /// Number of projects processed concurrently
    pub jobs: usize,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}
