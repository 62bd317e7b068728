//! Interfaces to the systems a release touches
//!
//! The release engine only talks to version control, CI, registries and
//! hosting platforms through these traits, so every stage can be driven
//! against in-memory fakes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ProjectConfig;
use crate::error::{AdapterError, RemoteError, Result};
use crate::types::{Ecosystem, PublishOutcome};
use crate::version::Version;

/// A tag and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    pub target: String,
}

/// A commit as seen by the gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub id: String,
    pub message: String,
    /// Paths changed relative to the first parent
    pub paths: Vec<PathBuf>,
    pub time: DateTime<Utc>,
}

/// Result of asking the VCS for a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCreation {
    Created,
    /// Tag already existed and points at the requested revision
    AlreadyPresent,
}

/// Version control backend for one working tree
pub trait Vcs: Send {
    /// Root of the working tree
    fn root(&self) -> &Path;

    fn tags(&self) -> Result<Vec<TagInfo>>;

    /// Commit id of HEAD
    fn head_revision(&self) -> Result<String>;

    /// Whether there are no uncommitted modifications to tracked files
    fn is_clean(&self) -> Result<bool>;

    /// Commits reachable from HEAD but not from `tag`; all of history when `None`
    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<CommitSummary>>;

    /// Time of the most recent commit on HEAD
    fn last_commit_time(&self) -> Result<Option<DateTime<Utc>>>;

    /// Commit every modification in the working tree, returning the new id
    fn commit_all(&self, message: &str) -> Result<String>;

    /// Create an annotated tag at HEAD. Never moves an existing tag.
    fn create_tag(&self, name: &str, message: &str) -> Result<TagCreation>;

    /// Push the current branch and `tags` to the default remote, if any
    fn push(&self, tags: &[String]) -> Result<()>;
}

/// CI state of a revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum CiStatus {
    Passing,
    Failing(String),
    Pending(String),
    Unknown,
}

#[async_trait]
pub trait CiProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Combined CI state of `reference`, a branch name or a revision
    async fn status(&self, reference: &str) -> std::result::Result<CiStatus, RemoteError>;

    /// Branch the hosting platform treats as the repository default
    async fn default_branch(&self) -> std::result::Result<String, RemoteError>;
}

/// Hosting platform release entries
#[async_trait]
pub trait ReleaseHost: Send + Sync {
    fn name(&self) -> &str;

    /// Create a release entry for `tag`, returning its URL
    async fn create_release(
        &self,
        tag: &str,
        version: &Version,
        notes: Option<&str>,
    ) -> std::result::Result<String, RemoteError>;
}

/// Launchpad-style milestone and release tracking
#[async_trait]
pub trait MilestoneTracker: Send + Sync {
    fn name(&self) -> &str;

    /// Mark `version` as released, creating its milestone when needed
    async fn ensure_release(
        &self,
        version: &Version,
        notes: Option<&str>,
    ) -> std::result::Result<(), RemoteError>;

    async fn create_milestone(&self, version: &Version) -> std::result::Result<(), RemoteError>;
}

/// Registry name and project URL, as declared by a manifest
pub type RegistryUrl = (String, Option<String>);

/// Ecosystem-specific project metadata
pub trait ManifestAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn ecosystem(&self) -> Ecosystem;

    /// Whether the marker file for this ecosystem exists
    fn detect(&self, root: &Path) -> bool;

    /// Files that `write_version` rewrites
    fn manifest_files(&self, root: &Path) -> Vec<PathBuf>;

    /// `ManifestNotFound` when absent, `VersionNotLocated` when not stored literally
    fn read_version(&self, root: &Path) -> std::result::Result<Version, AdapterError>;

    /// Minimal text edit of the version field
    fn write_version(&self, root: &Path, version: &Version)
        -> std::result::Result<(), AdapterError>;

    fn read_project_name(&self, root: &Path) -> std::result::Result<String, AdapterError>;

    fn read_registry_urls(&self, root: &Path)
        -> std::result::Result<Vec<RegistryUrl>, AdapterError>;

    /// Shell command that brings derived files such as lockfiles in line
    /// after `write_version`
    fn refresh_command(&self, _root: &Path) -> Option<String> {
        None
    }
}

/// Builds and uploads artifacts for one ecosystem
#[async_trait]
pub trait Publisher: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;

    fn registry(&self) -> &'static str;

    async fn publish(&self, root: &Path, config: &ProjectConfig) -> PublishOutcome;

    /// Built artifacts left under `root` by the last `publish`
    fn artifacts(&self, _root: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// A project found by a discovery source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub name: String,
    /// Source that reported the project, e.g. `pypi`
    pub source: String,
    /// Repository URL or local path; `None` when the source does not know it
    pub location: Option<String>,
}

/// Something that can list projects owned by the operator
#[async_trait]
pub trait ProjectSource: Send + Sync {
    fn name(&self) -> &str;

    async fn list_projects(&self) -> std::result::Result<Vec<ProjectRef>, RemoteError>;
}
