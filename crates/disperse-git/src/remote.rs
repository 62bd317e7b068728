//! Remote operations

use std::path::Path;
use std::process::Command;

use tracing::{debug, info, instrument};

use disperse_core::error::GitError;

use crate::repository::{GitRepo, Result};

const DEFAULT_REMOTE: &str = "origin";

impl GitRepo {
    /// Get list of remote names
    pub fn remotes(&self) -> Result<Vec<String>> {
        let remotes = self.repo.remotes()?;
        Ok(remotes
            .iter()
            .filter_map(|r| r.map(|s| s.to_string()))
            .collect())
    }

    /// Get the URL for a remote
    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(|s| s.to_string())),
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                Err(GitError::RemoteNotFound(name.to_string()))
            }
            Err(e) => Err(GitError::Git2(e)),
        }
    }

    /// Push HEAD and `tags` to `origin`; a repository without it is left alone
    #[instrument(skip(self))]
    pub fn push_release(&self, tags: &[String]) -> Result<()> {
        if !self.remotes()?.iter().any(|r| r == DEFAULT_REMOTE) {
            debug!("no {DEFAULT_REMOTE} remote, not pushing");
            return Ok(());
        }
        let mut refspecs = vec!["HEAD".to_string()];
        refspecs.extend(tags.iter().map(|t| format!("refs/tags/{t}")));
        git_push(self.path(), DEFAULT_REMOTE, &refspecs)
    }
}

/// Push using git CLI (more reliable for authentication)
#[instrument(fields(cwd = %cwd.display()))]
pub fn git_push(cwd: &Path, remote: &str, refspecs: &[String]) -> Result<()> {
    let start = std::time::Instant::now();
    let output = Command::new("git")
        .arg("push")
        .arg(remote)
        .args(refspecs)
        .current_dir(cwd)
        .output()
        .map_err(|e| GitError::PushFailed(e.to_string()))?;
    info!(
        remote,
        refspecs = ?refspecs,
        duration_ms = start.elapsed().as_millis() as u64,
        success = output.status.success(),
        "git push (CLI)"
    );
    if !output.status.success() {
        return Err(GitError::PushFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::setup_repo;
    use git2::Repository;
    use tempfile::TempDir;

    #[test]
    fn test_remote_not_found() {
        let (_temp, repo) = setup_repo();
        assert!(repo.remotes().unwrap().is_empty());
        let result = repo.remote_url("nonexistent");
        assert!(matches!(result, Err(GitError::RemoteNotFound(_))));
    }

    #[test]
    fn test_push_without_remote_is_noop() {
        let (_temp, repo) = setup_repo();
        repo.push_release(&["v1.0.0".to_string()]).unwrap();
    }

    #[test]
    fn test_push_release_to_bare_remote() {
        let (_temp, repo) = setup_repo();
        let remote_dir = TempDir::new().unwrap();
        let bare = Repository::init_bare(remote_dir.path()).unwrap();
        repo.inner()
            .remote(DEFAULT_REMOTE, &remote_dir.path().to_string_lossy())
            .unwrap();
        let branch = repo.current_branch().unwrap().unwrap();
        repo.create_release_tag("v1.0.0", "Release 1.0.0").unwrap();

        repo.push_release(&["v1.0.0".to_string()]).unwrap();

        assert!(bare.find_reference("refs/tags/v1.0.0").is_ok());
        assert!(bare.find_reference(&format!("refs/heads/{branch}")).is_ok());
    }
}
