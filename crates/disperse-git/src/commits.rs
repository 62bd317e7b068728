//! Commit history operations

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use git2::{Oid, Sort};
use tracing::{info, instrument};

use disperse_core::error::GitError;
use disperse_core::traits::CommitSummary;

use crate::repository::{GitRepo, Result};

impl GitRepo {
    /// Commits on HEAD that are not reachable from `tag`; all history without one
    pub fn commits_since_tag(&self, tag: Option<&str>) -> Result<Vec<CommitSummary>> {
        let head = self.head_commit()?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push(head.id())?;
        if let Some(tag) = tag {
            let tag_ref = format!("refs/tags/{}", tag);
            let target = self.repo.find_reference(&tag_ref)?.peel_to_commit()?;
            revwalk.hide(target.id())?;
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            commits.push(self.summarize(oid?)?);
        }
        Ok(commits)
    }

    /// Commit time of HEAD; `None` on an unborn branch
    pub fn head_time(&self) -> Result<Option<DateTime<Utc>>> {
        match self.head_commit() {
            Ok(commit) => Ok(Some(timestamp(&commit))),
            Err(GitError::NoCommits) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stage every change to tracked files and commit on HEAD
    #[instrument(skip(self))]
    pub fn commit_tracked(&self, message: &str) -> Result<String> {
        let mut index = self.repo.index()?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        let sig = self
            .repo
            .signature()
            .map_err(|e| GitError::CommitFailed(e.message().to_string()))?;
        let parent = self.head_commit()?;
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
            .map_err(|e| GitError::CommitFailed(e.message().to_string()))?;
        info!(id = %oid, message, "committed");
        Ok(oid.to_string())
    }

    fn summarize(&self, oid: Oid) -> Result<CommitSummary> {
        let commit = self.repo.find_commit(oid)?;
        let tree = commit.tree()?;
        let parent_tree = match commit.parents().next() {
            Some(parent) => Some(parent.tree()?),
            None => None,
        };
        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        let paths = diff
            .deltas()
            .filter_map(|d| d.new_file().path().or_else(|| d.old_file().path()))
            .map(PathBuf::from)
            .collect();

        Ok(CommitSummary {
            id: commit.id().to_string(),
            message: commit.message().unwrap_or_default().to_string(),
            paths,
            time: timestamp(&commit),
        })
    }
}

fn timestamp(commit: &git2::Commit<'_>) -> DateTime<Utc> {
    Utc.timestamp_opt(commit.time().seconds(), 0)
        .single()
        .unwrap_or_else(Utc::now)
}
