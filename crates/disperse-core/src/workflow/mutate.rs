//! Working-tree mutation for a release

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::{MutationError, Result};
use crate::manpage::update_version_in_manpage;
use crate::news_file::NewsFile;
use crate::project::Project;
use crate::update_version::update_version_in_file;
use crate::version::{Status, Version};

/// Files a release of `project` rewrites, in the order they are touched
pub fn files_to_mutate(project: &Project) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut push = |p: PathBuf| {
        if !files.contains(&p) {
            files.push(p);
        }
    };
    if let Some(news) = &project.config.news_file {
        push(project.path(news));
    }
    for rule in &project.config.update_version {
        push(project.path(&rule.path));
    }
    for manpage in project.manpages() {
        push(manpage);
    }
    if project.manifest.version.is_some() {
        if let Some(adapter) = &project.manifest.adapter {
            for file in adapter.manifest_files(&project.root) {
                push(file);
            }
        }
    }
    files
}

/// What mutation did besides rewriting files
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MutationReport {
    /// Rules that matched nothing while others for the same file did, and
    /// a pending news entry renamed to the released version
    pub warnings: Vec<String>,
    /// Change notes taken from the news file
    pub notes: Option<String>,
}

/// Apply every rewrite for `version` to the working tree.
///
/// A rule matching nothing is a warning, but if no rule for a file matches
/// the configuration is presumed broken and this fails.
pub fn apply(project: &Project, version: &Version, date: NaiveDate) -> Result<MutationReport> {
    let mut report = MutationReport::default();

    if let Some(news) = &project.config.news_file {
        let news_file = NewsFile::new(project.path(news));
        if let Some(previous) = news_file.retitle_pending(version)? {
            let warning = format!("news entry {previous} released as {version}");
            warn!(project = %project.name, "{warning}");
            report.warnings.push(warning);
        }
        let notes = news_file.mark_released(version, date)?;
        report.notes = Some(notes).filter(|n| !n.is_empty());
    }

    let mut files: Vec<&PathBuf> = Vec::new();
    for rule in &project.config.update_version {
        if !files.contains(&&rule.path) {
            files.push(&rule.path);
        }
    }
    for file in files {
        let path = project.path(file);
        let mut matched = 0;
        let mut unmatched = Vec::new();
        for rule in project.config.update_version.iter().filter(|r| &r.path == file) {
            let n = update_version_in_file(
                &path,
                rule.match_pattern.as_deref(),
                &rule.new_line,
                version,
                Status::Final,
            )?;
            if n == 0 {
                unmatched.push(rule);
            }
            matched += n;
        }
        if matched == 0 {
            return Err(MutationError::NoMatches { path }.into());
        }
        for rule in unmatched {
            let warning = format!(
                "update-version rule for {} ({}) matched nothing",
                file.display(),
                rule.match_pattern.as_deref().unwrap_or(&rule.new_line)
            );
            warn!(project = %project.name, "{warning}");
            report.warnings.push(warning);
        }
        info!(path = %path.display(), lines = matched, "updated version");
    }

    for manpage in project.manpages() {
        update_version_in_manpage(&manpage, version, date)?;
    }

    if project.manifest.version.is_some() {
        if let Some(adapter) = &project.manifest.adapter {
            adapter.write_version(&project.root, version)?;
            info!(adapter = adapter.name(), version = %version, "updated manifest");
        }
    }

    Ok(report)
}
