//! Wiring projects to their working trees and remote collaborators

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use disperse_adapters::{default_publishers, AdapterRegistry};
use disperse_core::config::{find_config, load_user_config, user_config_path, UserConfig};
use disperse_core::error::{ConfigError, DisperseError, NewsFileError};
use disperse_core::news_file::NewsFile;
use disperse_core::traits::{CiProvider, MilestoneTracker, ProjectRef, ReleaseHost, Vcs};
use disperse_core::workflow::infer_current;
use disperse_core::{
    Collaborators, Orchestrator, Project, ProjectRunner, PublisherDispatch, ReleaseOptions,
    ReleaseReport, Result, TagTemplate,
};
use disperse_git::{Checkout, GitRepo};
use disperse_stores::{GitHubClient, LaunchpadClient};

/// Whether `target` names a remote repository rather than a local path
pub fn is_remote(target: &str) -> bool {
    target.contains("://") || target.starts_with("git@")
}

/// A project's working tree: an existing checkout or a temporary clone
pub enum WorkTree {
    Local { repo: GitRepo, root: PathBuf },
    Cloned(Checkout),
}

impl WorkTree {
    /// Open the repository containing `path`; the project root is the
    /// directory holding the nearest configuration file
    pub fn local(path: &Path) -> Result<Self> {
        let path = std::fs::canonicalize(path)?;
        let repo = GitRepo::discover(&path)?;
        let root = find_config(&path)
            .and_then(|config| config.parent().map(Path::to_path_buf))
            .unwrap_or(path);
        Ok(Self::Local { repo, root })
    }

    /// Clone `url` into a temporary directory off the async executor
    pub async fn clone_remote(url: &str) -> Result<Self> {
        let owned = url.to_string();
        let checkout = tokio::task::spawn_blocking(move || Checkout::clone_from(&owned))
            .await
            .map_err(|e| DisperseError::other(format!("clone of {url} panicked: {e}")))??;
        Ok(Self::Cloned(checkout))
    }

    /// Local path or remote URL
    pub async fn open(target: &str) -> Result<Self> {
        if is_remote(target) {
            Self::clone_remote(target).await
        } else {
            Self::local(Path::new(target))
        }
    }

    pub fn repo(&self) -> &GitRepo {
        match self {
            Self::Local { repo, .. } => repo,
            Self::Cloned(checkout) => checkout.repo(),
        }
    }

    pub fn root(&self) -> &Path {
        match self {
            Self::Local { root, .. } => root,
            Self::Cloned(checkout) => checkout.repo().path(),
        }
    }
}

/// Process-wide collaborators shared by every project
pub struct Services {
    pub adapters: AdapterRegistry,
    pub publishers: PublisherDispatch,
    pub user: UserConfig,
}

impl Services {
    pub fn load() -> Result<Self> {
        let user = load_user_config(user_config_path().as_deref())?;
        Ok(Self::with_user_config(user))
    }

    pub fn with_user_config(user: UserConfig) -> Self {
        Self {
            adapters: AdapterRegistry::new(),
            publishers: default_publishers(),
            user,
        }
    }

    pub fn load_project(&self, tree: &WorkTree) -> Result<Project> {
        Project::load(tree.root(), self.adapters.all())
    }

    /// Run one release attempt against the platforms `project` configures
    pub async fn release(
        &self,
        project: &Project,
        vcs: &dyn Vcs,
        options: ReleaseOptions,
    ) -> Result<ReleaseReport> {
        let github = project
            .config
            .github
            .as_ref()
            .map(|gh| GitHubClient::from_url(&gh.url))
            .transpose()
            .map_err(|e| invalid("github.url", e))?;
        let launchpad = project
            .config
            .launchpad
            .as_ref()
            .map(|lp| LaunchpadClient::new(&lp.project, lp.series.clone()))
            .transpose()
            .map_err(|e| invalid("launchpad", e))?;

        let deps = Collaborators {
            vcs,
            publishers: &self.publishers,
            ci: github.as_ref().map(|g| g as &dyn CiProvider),
            host: github.as_ref().map(|g| g as &dyn ReleaseHost),
            milestones: launchpad.as_ref().map(|l| l as &dyn MilestoneTracker),
            retry: &self.user.retry,
        };
        Ok(Orchestrator::new(project, deps, options).run().await)
    }
}

fn invalid(field: &str, error: impl std::fmt::Display) -> DisperseError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: error.to_string(),
    }
    .into()
}

/// Releases discovered projects, cloning the ones that live remotely
pub struct FleetRunner<'a> {
    pub services: &'a Services,
    pub options: ReleaseOptions,
}

#[async_trait(?Send)]
impl ProjectRunner for FleetRunner<'_> {
    async fn release(&self, project: &ProjectRef) -> Result<ReleaseReport> {
        let location = project.location.as_deref().ok_or_else(|| {
            DisperseError::other(format!("no repository known for {}", project.name))
        })?;
        let tree = WorkTree::open(location).await?;
        let loaded = self.services.load_project(&tree)?;
        self.services
            .release(&loaded, tree.repo(), self.options.clone())
            .await
    }
}

/// Version state of a project, as shown by `info`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub ecosystem: Option<String>,
    /// Registries the manifest publishes to
    pub registries: Vec<String>,
    /// Repository URL declared by the manifest
    pub repository: Option<String>,
    pub current_version: Option<String>,
    pub last_tag: Option<String>,
    pub manifest_version: Option<String>,
    pub pending_version: Option<String>,
    pub unreleased_commits: Option<usize>,
    /// Problems that would stop a release
    pub problems: Vec<String>,
}

/// Gather version information without changing anything
pub fn project_info(project: &Project, vcs: &dyn Vcs) -> Result<ProjectInfo> {
    let mut info = ProjectInfo {
        name: project.name.clone(),
        ecosystem: project.ecosystem().map(|e| e.to_string()),
        manifest_version: project.manifest.version.as_ref().map(|v| v.to_string()),
        ..Default::default()
    };

    match project.registries() {
        Ok(registries) => {
            info.repository = registries.iter().find_map(|(_, url)| url.clone());
            info.registries = registries.into_iter().map(|(name, _)| name).collect();
        }
        Err(e) => info.problems.push(e.to_string()),
    }

    let template = TagTemplate::new(&project.config.tag_name)?;
    let tags = vcs.tags()?;
    match infer_current(&tags, &template, project.manifest.version.as_ref()) {
        Ok(current) => {
            info.current_version = Some(current.version.to_string());
            info.last_tag = current.tag;
        }
        Err(e) => info.problems.push(e.to_string()),
    }
    info.unreleased_commits = Some(vcs.commits_since(info.last_tag.as_deref())?.len());

    if let Some(news) = &project.config.news_file {
        match NewsFile::new(project.path(news)).find_pending() {
            Ok(Some(version)) => info.pending_version = Some(version.to_string()),
            Ok(None) => debug!(project = %project.name, "pending entry has no version yet"),
            Err(NewsFileError::NoUnreleasedChanges(_)) => {}
            Err(e) => info.problems.push(e.to_string()),
        }
    }

    info!(
        project = %info.name,
        current = ?info.current_version,
        unreleased = ?info.unreleased_commits,
        "collected project info"
    );
    Ok(info)
}
