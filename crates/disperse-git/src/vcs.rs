use std::path::Path;

use chrono::{DateTime, Utc};

use disperse_core::traits::{CommitSummary, TagCreation, TagInfo, Vcs};
use disperse_core::Result;

use crate::repository::GitRepo;

impl Vcs for GitRepo {
    fn root(&self) -> &Path {
        self.path()
    }

    fn tags(&self) -> Result<Vec<TagInfo>> {
        Ok(self.list_tags()?)
    }

    fn head_revision(&self) -> Result<String> {
        Ok(self.head_commit()?.id().to_string())
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.has_clean_tree()?)
    }

    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<CommitSummary>> {
        Ok(self.commits_since_tag(tag)?)
    }

    fn last_commit_time(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.head_time()?)
    }

    fn commit_all(&self, message: &str) -> Result<String> {
        Ok(self.commit_tracked(message)?)
    }

    fn create_tag(&self, name: &str, message: &str) -> Result<TagCreation> {
        Ok(self.create_release_tag(name, message)?)
    }

    fn push(&self, tags: &[String]) -> Result<()> {
        Ok(self.push_release(tags)?)
    }
}
