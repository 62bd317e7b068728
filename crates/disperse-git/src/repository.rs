//! Git repository operations

use std::path::{Path, PathBuf};

use git2::Repository;
use tempfile::TempDir;
use tracing::{info, instrument};

use disperse_core::error::GitError;

/// Result type for git operations
pub type Result<T> = std::result::Result<T, GitError>;

/// Git repository wrapper
pub struct GitRepo {
    pub(crate) repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Open a repository at the given path
    #[instrument(fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitError::RepositoryNotFound(path.to_path_buf())
            } else {
                GitError::OpenFailed(e.to_string())
            }
        })?;
        Self::from_repository(repo)
    }

    /// Discover and open a repository by searching parent directories
    #[instrument(fields(start_path = %start_path.display()))]
    pub fn discover(start_path: &Path) -> Result<Self> {
        let repo = Repository::discover(start_path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitError::RepositoryNotFound(start_path.to_path_buf())
            } else {
                GitError::OpenFailed(e.to_string())
            }
        })?;
        Self::from_repository(repo)
    }

    fn from_repository(repo: Repository) -> Result<Self> {
        let path = repo
            .workdir()
            .ok_or_else(|| GitError::OpenFailed("bare repositories have no working tree".into()))?
            .to_path_buf();
        Ok(Self { repo, path })
    }

    /// Root of the working tree
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a reference to the inner git2 Repository
    pub fn inner(&self) -> &Repository {
        &self.repo
    }

    /// Get the HEAD commit
    pub fn head_commit(&self) -> Result<git2::Commit<'_>> {
        let head = self.repo.head().map_err(|e| match e.code() {
            git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound => GitError::NoCommits,
            _ => GitError::Git2(e),
        })?;
        head.peel_to_commit().map_err(GitError::Git2)
    }
}

/// A clone in a temporary directory, removed on drop
pub struct Checkout {
    repo: GitRepo,
    _dir: TempDir,
}

impl Checkout {
    /// Clone `url` into a fresh temporary directory
    #[instrument]
    pub fn clone_from(url: &str) -> Result<Self> {
        let dir = TempDir::new().map_err(|e| GitError::CloneFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let start = std::time::Instant::now();
        let repo = Repository::clone(url, dir.path()).map_err(|e| GitError::CloneFailed {
            url: url.to_string(),
            reason: e.message().to_string(),
        })?;
        info!(
            url,
            duration_ms = start.elapsed().as_millis() as u64,
            "cloned repository"
        );
        Ok(Self {
            repo: GitRepo::from_repository(repo)?,
            _dir: dir,
        })
    }

    pub fn repo(&self) -> &GitRepo {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::setup_repo;

    #[test]
    fn test_discover_repo() {
        let (temp, _) = setup_repo();
        let subdir = temp.path().join("sub").join("dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let repo = GitRepo::discover(&subdir).unwrap();
        // Canonicalize both paths to handle macOS /var -> /private/var symlink
        let repo_path = repo.path().canonicalize().unwrap();
        let temp_path = temp.path().canonicalize().unwrap();
        assert_eq!(repo_path, temp_path);
    }

    #[test]
    fn test_not_a_repo() {
        let temp = TempDir::new().unwrap();
        let result = GitRepo::open(temp.path());
        assert!(matches!(result, Err(GitError::RepositoryNotFound(_))));
    }

    #[test]
    fn test_unborn_head_has_no_commits() {
        let temp = TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();
        let repo = GitRepo::open(temp.path()).unwrap();
        assert!(matches!(repo.head_commit(), Err(GitError::NoCommits)));
    }

    #[test]
    fn test_clone_local_repository() {
        let (source, _) = setup_repo();
        let url = source.path().to_string_lossy().into_owned();
        let checkout = Checkout::clone_from(&url).unwrap();
        assert!(checkout.repo().path().join("file.txt").exists());
    }

    #[test]
    fn test_clone_failure() {
        let temp = TempDir::new().unwrap();
        let url = temp.path().join("missing").to_string_lossy().into_owned();
        assert!(matches!(
            Checkout::clone_from(&url),
            Err(GitError::CloneFailed { .. })
        ));
    }
}
