//! In-memory collaborators for driving the release engine in tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::config::ProjectConfig;
use crate::error::{GitError, RemoteError, Result};
use crate::traits::{
    CiProvider, CiStatus, CommitSummary, MilestoneTracker, Publisher, ReleaseHost, TagCreation,
    TagInfo, Vcs,
};
use crate::types::{Ecosystem, PublishOutcome};
use crate::version::Version;

pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub(crate) fn commit(message: &str, paths: &[&str], days_ago: i64) -> CommitSummary {
    CommitSummary {
        id: format!("c-{message}"),
        message: message.to_string(),
        paths: paths.iter().map(PathBuf::from).collect(),
        time: fixed_now() - chrono::Duration::days(days_ago),
    }
}

#[derive(Default)]
struct VcsState {
    tags: Vec<TagInfo>,
    commits: Vec<CommitSummary>,
    head: usize,
    dirty: bool,
    messages: Vec<String>,
    pushed: Vec<String>,
    race_tag: Option<String>,
}

/// VCS over a temporary directory with scripted history
pub(crate) struct FakeVcs {
    dir: TempDir,
    state: Mutex<VcsState>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            state: Mutex::new(VcsState::default()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        fixed_now()
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(path)).unwrap()
    }

    pub fn add_commit(&self, commit: CommitSummary) {
        let mut state = self.state.lock().unwrap();
        state.commits.push(commit);
        state.head += 1;
    }

    pub fn add_tag(&self, name: &str, target: &str) {
        self.state.lock().unwrap().tags.push(TagInfo {
            name: name.to_string(),
            target: target.to_string(),
        });
    }

    /// Make `name` appear at another revision as soon as something is committed
    pub fn race_tag(&self, name: &str) {
        self.state.lock().unwrap().race_tag = Some(name.to_string());
    }

    pub fn set_dirty(&self) {
        self.state.lock().unwrap().dirty = true;
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .tags
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn tag_target(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.target.clone())
    }

    pub fn messages(&self) -> Vec<String> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn pushed(&self) -> Vec<String> {
        self.state.lock().unwrap().pushed.clone()
    }

    pub fn head(&self) -> String {
        format!("rev-{}", self.state.lock().unwrap().head)
    }
}

impl Vcs for FakeVcs {
    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn tags(&self) -> Result<Vec<TagInfo>> {
        Ok(self.state.lock().unwrap().tags.clone())
    }

    fn head_revision(&self) -> Result<String> {
        Ok(self.head())
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(!self.state.lock().unwrap().dirty)
    }

    fn commits_since(&self, _tag: Option<&str>) -> Result<Vec<CommitSummary>> {
        Ok(self.state.lock().unwrap().commits.clone())
    }

    fn last_commit_time(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .commits
            .iter()
            .map(|c| c.time)
            .max())
    }

    fn commit_all(&self, message: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.head += 1;
        state.dirty = false;
        state.messages.push(message.to_string());
        if let Some(name) = state.race_tag.take() {
            state.tags.push(TagInfo {
                name,
                target: "rev-elsewhere".to_string(),
            });
        }
        Ok(format!("rev-{}", state.head))
    }

    fn create_tag(&self, name: &str, _message: &str) -> Result<TagCreation> {
        let mut state = self.state.lock().unwrap();
        let head = format!("rev-{}", state.head);
        if let Some(existing) = state.tags.iter().find(|t| t.name == name) {
            if existing.target == head {
                return Ok(TagCreation::AlreadyPresent);
            }
            return Err(GitError::TagConflict {
                name: name.to_string(),
                existing: existing.target.clone(),
                requested: head,
            }
            .into());
        }
        state.tags.push(TagInfo {
            name: name.to_string(),
            target: head,
        });
        Ok(TagCreation::Created)
    }

    fn push(&self, tags: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pushed.push("HEAD".to_string());
        state.pushed.extend(tags.iter().cloned());
        Ok(())
    }
}

/// CI provider answering with a fixed status, or a per-reference script
pub(crate) struct FakeCi {
    status: CiStatus,
    scripts: Mutex<Vec<(String, Vec<CiStatus>)>>,
    transient_failures: usize,
    calls: AtomicUsize,
    queried: Mutex<Vec<String>>,
}

impl FakeCi {
    pub fn new(status: CiStatus) -> Self {
        Self {
            status,
            scripts: Mutex::new(Vec::new()),
            transient_failures: 0,
            calls: AtomicUsize::new(0),
            queried: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(mut self, n: usize) -> Self {
        self.transient_failures = n;
        self
    }

    /// Answer queries for `reference` with `statuses` in turn; the last one repeats
    pub fn script(self, reference: &str, statuses: Vec<CiStatus>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push((reference.to_string(), statuses));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl CiProvider for FakeCi {
    fn name(&self) -> &str {
        "fake-ci"
    }

    async fn status(&self, reference: &str) -> std::result::Result<CiStatus, RemoteError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.queried.lock().unwrap().push(reference.to_string());
        if n < self.transient_failures {
            return Err(RemoteError::transient("fake-ci", "502 Bad Gateway"));
        }
        let mut scripts = self.scripts.lock().unwrap();
        if let Some((_, statuses)) = scripts.iter_mut().find(|(r, _)| r == reference) {
            if statuses.len() > 1 {
                return Ok(statuses.remove(0));
            }
            if let Some(last) = statuses.first() {
                return Ok(last.clone());
            }
        }
        Ok(self.status.clone())
    }

    async fn default_branch(&self) -> std::result::Result<String, RemoteError> {
        Ok("main".to_string())
    }
}

/// Release host and milestone tracker recording what it was asked to do
#[derive(Default)]
pub(crate) struct FakeHost {
    pub fail: bool,
    pub releases: Mutex<Vec<String>>,
    pub milestones: Mutex<Vec<String>>,
}

#[async_trait]
impl ReleaseHost for FakeHost {
    fn name(&self) -> &str {
        "fake-host"
    }

    async fn create_release(
        &self,
        tag: &str,
        _version: &Version,
        _notes: Option<&str>,
    ) -> std::result::Result<String, RemoteError> {
        if self.fail {
            return Err(RemoteError::permanent("fake-host", "403 Forbidden"));
        }
        self.releases.lock().unwrap().push(tag.to_string());
        Ok(format!("https://example.com/releases/{tag}"))
    }
}

#[async_trait]
impl MilestoneTracker for FakeHost {
    fn name(&self) -> &str {
        "fake-tracker"
    }

    async fn ensure_release(
        &self,
        version: &Version,
        _notes: Option<&str>,
    ) -> std::result::Result<(), RemoteError> {
        if self.fail {
            return Err(RemoteError::permanent("fake-tracker", "401 Unauthorized"));
        }
        self.releases.lock().unwrap().push(version.to_string());
        Ok(())
    }

    async fn create_milestone(&self, version: &Version) -> std::result::Result<(), RemoteError> {
        self.milestones.lock().unwrap().push(version.to_string());
        Ok(())
    }
}

/// Publisher returning a scripted outcome; success leaves `dist/proj.tar.gz`
pub(crate) struct FakePublisher {
    pub ecosystem: Ecosystem,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakePublisher {
    pub fn new(ecosystem: Ecosystem, fail: bool) -> Self {
        Self {
            ecosystem,
            fail,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    fn registry(&self) -> &'static str {
        self.ecosystem.registry()
    }

    async fn publish(&self, root: &Path, _config: &ProjectConfig) -> PublishOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            PublishOutcome::Failed {
                registry: self.registry().to_string(),
                stage: crate::types::PublishFailure::Upload,
                reason: "503 Service Unavailable".to_string(),
            }
        } else {
            std::fs::create_dir_all(root.join("dist")).unwrap();
            std::fs::write(root.join("dist").join("proj.tar.gz"), b"sdist").unwrap();
            PublishOutcome::Succeeded {
                registry: self.registry().to_string(),
            }
        }
    }

    fn artifacts(&self, root: &Path) -> Vec<PathBuf> {
        let tarball = root.join("dist").join("proj.tar.gz");
        if tarball.exists() {
            vec![tarball]
        } else {
            Vec::new()
        }
    }
}
