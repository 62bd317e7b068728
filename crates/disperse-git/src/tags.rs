//! Tag operations

use tracing::{debug, info, instrument};

use disperse_core::error::GitError;
use disperse_core::traits::{TagCreation, TagInfo};

use crate::repository::{GitRepo, Result};

impl GitRepo {
    /// All tags, each with the id of the commit it resolves to
    #[instrument(skip(self))]
    pub fn list_tags(&self) -> Result<Vec<TagInfo>> {
        let names = self.repo.tag_names(None)?;
        let mut tags = Vec::with_capacity(names.len());
        for name in names.iter().flatten() {
            if let Some(target) = self.find_tag(name)? {
                tags.push(TagInfo {
                    name: name.to_string(),
                    target,
                });
            }
        }
        debug!(count = tags.len(), "listed all tags");
        Ok(tags)
    }

    /// Commit id a tag resolves to, if the tag exists
    pub fn find_tag(&self, name: &str) -> Result<Option<String>> {
        let tag_ref = format!("refs/tags/{}", name);

        match self.repo.find_reference(&tag_ref) {
            Ok(reference) => match reference.peel_to_commit() {
                Ok(commit) => Ok(Some(commit.id().to_string())),
                // tags on trees or blobs never name a release
                Err(_) => Ok(None),
            },
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::Git2(e)),
        }
    }

    /// Create an annotated tag at HEAD without ever moving an existing one
    #[instrument(skip(self, message), fields(name))]
    pub fn create_release_tag(&self, name: &str, message: &str) -> Result<TagCreation> {
        let head = self.head_commit()?;
        let requested = head.id().to_string();

        if let Some(existing) = self.find_tag(name)? {
            if existing == requested {
                debug!(name, "tag already points at HEAD");
                return Ok(TagCreation::AlreadyPresent);
            }
            return Err(GitError::TagConflict {
                name: name.to_string(),
                existing,
                requested,
            });
        }

        let sig = self.repo.signature().map_err(|e| GitError::TagCreationFailed {
            name: name.to_string(),
            reason: e.message().to_string(),
        })?;
        self.repo
            .tag(name, head.as_object(), &sig, message, false)
            .map_err(|e| GitError::TagCreationFailed {
                name: name.to_string(),
                reason: e.message().to_string(),
            })?;

        info!(name, target = %requested, "created tag");
        Ok(TagCreation::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{commit_paths, setup_repo};

    #[test]
    fn test_list_tags_peels_annotated_tags() {
        let (_temp, repo) = setup_repo();
        let head = repo.head_commit().unwrap().id().to_string();
        repo.create_release_tag("v1.0.0", "Release 1.0.0").unwrap();
        let commit = repo.head_commit().unwrap();
        repo.inner()
            .tag_lightweight("light", commit.as_object(), false)
            .unwrap();

        let mut tags = repo.list_tags().unwrap();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "light");
        assert_eq!(tags[1].name, "v1.0.0");
        assert!(tags.iter().all(|t| t.target == head));
    }

    #[test]
    fn test_create_tag_is_idempotent_at_head() {
        let (_temp, repo) = setup_repo();
        assert_eq!(
            repo.create_release_tag("v1.0.0", "Release 1.0.0").unwrap(),
            TagCreation::Created
        );
        assert_eq!(
            repo.create_release_tag("v1.0.0", "Release 1.0.0").unwrap(),
            TagCreation::AlreadyPresent
        );
    }

    #[test]
    fn test_tag_conflict_does_not_move_tag() {
        let (temp, repo) = setup_repo();
        repo.create_release_tag("v1.0.0", "Release 1.0.0").unwrap();
        let original = repo.find_tag("v1.0.0").unwrap().unwrap();

        std::fs::write(temp.path().join("file.txt"), "changed").unwrap();
        commit_paths(repo.inner(), &["file.txt"], "Change");

        let result = repo.create_release_tag("v1.0.0", "Release 1.0.0");
        assert!(matches!(result, Err(GitError::TagConflict { .. })));
        assert_eq!(repo.find_tag("v1.0.0").unwrap().unwrap(), original);
    }

    #[test]
    fn test_missing_tag() {
        let (_temp, repo) = setup_repo();
        assert_eq!(repo.find_tag("v9.9.9").unwrap(), None);
    }
}
